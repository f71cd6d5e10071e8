//! Web API stubs: `fetch`, `Response`, `renderToString` and the legacy
//! `trigger(config)(handler)` wrapper

use super::super::env::Env;
use super::super::errors::{self, ErrorInfo};
use super::super::types::{EvalResult, PropertyMap, Val};
use super::super::vm::VM;
use super::{arg, namespace, StdlibFunc};
use crate::sandbox::console::ConsoleLevel;

pub fn inject_web(env: &Env) {
    env.declare("fetch", Val::native(StdlibFunc::Fetch), true);
    env.declare("Response", Val::native(StdlibFunc::ResponseCtor), true);
    env.declare("renderToString", Val::native(StdlibFunc::RenderToString), true);
    env.declare("trigger", Val::native(StdlibFunc::Trigger), true);
    env.declare("flowops", namespace(&[("trigger", StdlibFunc::Trigger)]), true);
}

fn field_or(options: &Val, name: &str, default: Val) -> Val {
    match options {
        Val::Obj(map) => match map.borrow().get(name) {
            Some(v) if v.is_truthy() => v.clone(),
            _ => default,
        },
        _ => default,
    }
}

/// `new Response(body, { status, statusText, headers })`
pub fn make_response(vm: &VM, body: Val, options: Val) -> Val {
    let status = field_or(&options, "status", Val::Num(200.0));
    let status_text = field_or(&options, "statusText", Val::str(""));
    let headers = field_or(&options, "headers", Val::obj(PropertyMap::new()));

    vm.log_values(
        ConsoleLevel::Log,
        &[
            Val::str("[SDK] Created Response:"),
            Val::obj_from([("status", status.clone()), ("headers", headers.clone())]),
        ],
    );

    Val::obj_from([
        ("body", body.clone()),
        ("status", status),
        ("statusText", status_text),
        ("headers", headers),
        ("text", Val::bound(StdlibFunc::ResponseText, body.clone())),
        ("json", Val::bound(StdlibFunc::ResponseJson, body)),
    ])
}

/// `response.json()`: strings are parsed, anything else is returned as is
pub fn response_json(body: &Val) -> EvalResult {
    let Val::Str(text) = body else {
        return Ok(Val::fulfilled(body.clone()));
    };
    Ok(match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => Val::fulfilled(Val::from_json(&json)),
        Err(e) => Val::rejected(Val::Error(ErrorInfo::new(
            errors::SYNTAX_ERROR,
            format!("Unexpected token in JSON: {}", e),
        ))),
    })
}

/// `fetch(url, options)` resolves to a canned `Response` chosen by URL
pub fn fetch(vm: &mut VM, args: &[Val]) -> EvalResult {
    let url = arg(args, 0);
    let options = match arg(args, 1) {
        Val::Undefined => Val::obj(PropertyMap::new()),
        other => other,
    };
    vm.log_values(
        ConsoleLevel::Log,
        &[
            Val::str("[SDK] Fetch request to:"),
            url.clone(),
            Val::str("with options:"),
            options,
        ],
    );

    let Val::Str(url) = url else {
        return Ok(Val::rejected(Val::Error(ErrorInfo::type_error(
            "url.includes is not a function",
        ))));
    };

    let (body, status) = if url.contains("example.com") {
        (r#"{"success":true,"data":{"id":"123","name":"Example"}}"#, None)
    } else if url.contains("error") {
        (r#"{"error":"Not found"}"#, Some(404.0))
    } else {
        (r#"{"mock":"data"}"#, None)
    };
    let options = match status {
        Some(code) => Val::obj_from([("status", Val::Num(code))]),
        None => Val::Undefined,
    };
    Ok(Val::fulfilled(make_response(vm, Val::str(body), options)))
}

/// `renderToString(element)`
pub fn render_to_string(vm: &VM, element: &Val) -> Val {
    vm.log(ConsoleLevel::Log, "[SDK] Rendering JSX element");
    if element.type_of() == "object" {
        Val::str("<div>Mocked JSX rendering</div>")
    } else {
        Val::Str(element.to_display())
    }
}
