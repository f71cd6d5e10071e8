//! Tests for thrown errors and how they propagate
//!
//! Uncaught throws surface as `Control::Throw`; `try` absorbs them.

use super::helpers::{run, run_body};
use crate::executor::{errors, Control, Val};
use serde_json::json;

#[test]
fn test_uncaught_error_message() {
    let run = run_body(r#"throw new Error("lead is missing an email")"#);
    assert_eq!(run.thrown(), "lead is missing an email");
}

#[test]
fn test_thrown_string_and_object() {
    assert_eq!(run_body(r#"throw "plain""#).thrown(), "plain");
    assert_eq!(
        run_body(r#"throw { message: "custom", code: 7 }"#).thrown(),
        "custom"
    );
}

#[test]
fn test_error_kinds() {
    let run = run_body(r#"throw new TypeError("bad input")"#);
    let Err(Control::Throw(Val::Error(info))) = &run.result else {
        panic!("Expected Error value, got {:?}", run.result);
    };
    assert_eq!(info.code, errors::TYPE_ERROR);
    assert_eq!(info.message, "bad input");
}

#[test]
fn test_try_catch_binds_error() {
    let run = run_body(
        r#"
        try {
            throw new Error("boom")
        } catch (err) {
            return { name: err.name, message: err.message }
        }
        "#,
    );
    assert_eq!(run.json(), json!({ "name": "Error", "message": "boom" }));
}

#[test]
fn test_finally_runs_on_every_path() {
    let run = run_body(
        r#"
        const trail = []
        try {
            trail.push("try")
        } finally {
            trail.push("finally")
        }
        try {
            try {
                throw new Error("inner")
            } finally {
                trail.push("inner finally")
            }
        } catch (e) {
            trail.push("caught " + e.message)
        }
        return trail
        "#,
    );
    assert_eq!(
        run.json(),
        json!(["try", "finally", "inner finally", "caught inner"])
    );
}

#[test]
fn test_catch_without_binding() {
    let run = run_body(
        r#"
        try { JSON.parse("{nope") } catch { return "recovered" }
        "#,
    );
    assert_eq!(run.json(), json!("recovered"));
}

#[test]
fn test_reading_property_of_undefined() {
    let run = run_body("return ctx.missing.field");
    assert_eq!(
        run.thrown(),
        "Cannot read properties of undefined (reading 'field')"
    );
}

#[test]
fn test_calling_a_non_function() {
    let run = run_body("ctx.text()");
    assert_eq!(run.thrown(), "ctx.text is not a function");
}

#[test]
fn test_undeclared_variable() {
    let run = run_body("return nowhere + 1");
    assert_eq!(run.thrown(), "nowhere is not defined");
}

#[test]
fn test_const_reassignment() {
    let run = run_body("const fixed = 1\nfixed = 2");
    assert_eq!(run.thrown(), "Assignment to constant variable.");
}

#[test]
fn test_destructuring_undefined() {
    let run = run_body("const { a } = ctx.nothing");
    assert!(run.thrown().starts_with("Cannot destructure property 'a'"));
}

#[test]
fn test_rejected_promise_rethrows_on_await() {
    let run = run_body(
        r#"
        const fail = async () => { throw new Error("async failure") }
        await fail()
        return "unreachable"
        "#,
    );
    assert_eq!(run.thrown(), "async failure");
}

#[test]
fn test_async_throw_can_be_caught() {
    let run = run_body(
        r#"
        const fail = async () => { throw new Error("nope") }
        try {
            await fail()
        } catch (e) {
            return "handled " + e.message
        }
        "#,
    );
    assert_eq!(run.json(), json!("handled nope"));
}

/* ===================== Program Loading ===================== */

#[test]
fn test_script_without_handler() {
    let run = run("const x = 1\nconsole.log(x)");
    assert_eq!(run.thrown(), "Could not extract handler function");
}

#[test]
fn test_exported_non_function() {
    let run = run("export default 42");
    assert_eq!(run.thrown(), "Could not extract handler function");
}

#[test]
fn test_top_level_return_is_illegal() {
    let run = run("return 1\nexport default async (ctx) => ctx");
    assert_eq!(run.thrown(), "Illegal return statement");
}

#[test]
fn test_top_level_throw_stops_loading() {
    let run = run(r#"throw new Error("config missing")
export default async (ctx) => ctx"#);
    assert_eq!(run.thrown(), "config missing");
}
