//! Tests for the step budget, call depth limit and cancellation

use super::helpers::{run_body, run_with};
use crate::executor::{run_handler, Control, HaltReason, Limits, VM};
use crate::parser;
use crate::sandbox::console::Console;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[test]
fn test_infinite_loop_hits_step_budget() {
    let run = run_with(
        "export default async (ctx) => { while (true) { } }",
        "default",
        json!({}),
        Limits {
            max_steps: 500,
            max_call_depth: 64,
            ..Limits::default()
        },
    );
    assert!(matches!(run.result, Err(Control::Halt(HaltReason::StepLimit))));
}

#[test]
fn test_try_cannot_swallow_halt() {
    let run = run_with(
        r#"export default async (ctx) => {
            try {
                while (true) { }
            } catch (e) {
                return "swallowed"
            } finally {
                return "finally"
            }
        }"#,
        "default",
        json!({}),
        Limits {
            max_steps: 500,
            max_call_depth: 64,
            ..Limits::default()
        },
    );
    assert!(matches!(run.result, Err(Control::Halt(HaltReason::StepLimit))));
}

#[test]
fn test_runaway_recursion() {
    let run = run_with(
        r#"export default async (ctx) => {
            function dive(n) { return dive(n + 1) }
            return dive(0)
        }"#,
        "default",
        json!({}),
        Limits {
            max_steps: 1_000_000,
            max_call_depth: 16,
            ..Limits::default()
        },
    );
    assert_eq!(run.thrown(), "Maximum call stack size exceeded");
}

#[test]
fn test_recursion_within_depth() {
    let run = run_body(
        r#"
        function fact(n) { return n <= 1 ? 1 : n * fact(n - 1) }
        return fact(10)
        "#,
    );
    assert_eq!(run.json(), json!(3628800));
}

#[test]
fn test_cancelled_token_halts() {
    let program = parser::parse_script("export default async (ctx) => { while (true) { } }")
        .expect("Parse script failed");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut vm = VM::new(Limits::default(), Console::default(), cancel);
    vm.install_sdk("default", "default");
    let result = run_handler(&mut vm, &program, &json!({}));

    assert!(matches!(result, Err(Control::Halt(HaltReason::Cancelled))));
}

#[test]
fn test_steps_are_counted() {
    let program = parser::parse_script("export default async (ctx) => { let i = 0; while (i < 10) { i++ } return i }")
        .expect("Parse script failed");
    let mut vm = VM::new(Limits::default(), Console::default(), CancellationToken::new());
    vm.install_sdk("default", "default");
    run_handler(&mut vm, &program, &json!({})).expect("Run failed");
    assert!(vm.steps() > 20);
}

/* ===================== String and array sizes ===================== */

fn run_with_string_limit(body: &str, max_string_len: usize) -> super::helpers::Run {
    run_with(
        &format!("export default async (ctx) => {{\n{}\n}}", body),
        "default",
        json!({}),
        Limits {
            max_string_len,
            ..Limits::default()
        },
    )
}

#[test]
fn test_huge_repeat_is_rejected() {
    let run = run_body(r#"return "ab".repeat(1e13)"#);
    assert_eq!(run.thrown(), "Invalid string length");
}

#[test]
fn test_doubling_loop_is_rejected() {
    let run = run_body(
        r#"
        let s = "x"
        let i = 0
        while (i < 60) { s = s + s; i++ }
        return s.length
        "#,
    );
    assert_eq!(run.thrown(), "Invalid string length");
}

#[test]
fn test_compound_append_is_rejected() {
    let run = run_with_string_limit(r#"let s = "abcd"; s += "efgh"; return s"#, 6);
    assert_eq!(run.thrown(), "Invalid string length");
}

#[test]
fn test_padding_is_rejected() {
    let run = run_body(r#"return "x".padStart(1e15, "ab")"#);
    assert_eq!(run.thrown(), "Invalid string length");

    let run = run_with_string_limit(r#"return "x".padEnd(20, "-")"#, 10);
    assert_eq!(run.thrown(), "Invalid string length");
}

#[test]
fn test_concat_is_rejected() {
    let run = run_with_string_limit(r#"return "abc".concat("def", "ghi")"#, 8);
    assert_eq!(run.thrown(), "Invalid string length");
}

#[test]
fn test_template_literal_is_rejected() {
    let run = run_with_string_limit(r#"const a = "12345"; return `${a}-${a}`"#, 10);
    assert_eq!(run.thrown(), "Invalid string length");
}

#[test]
fn test_join_is_rejected() {
    let run = run_with_string_limit(r#"return ["aaaa", "bbbb", "cccc"].join("")"#, 10);
    assert_eq!(run.thrown(), "Invalid string length");
}

#[test]
fn test_strings_within_limit() {
    let run = run_with_string_limit(
        r#"const a = "ab".repeat(3); return `${a}`.concat("!").padEnd(8, ".")"#,
        8,
    );
    assert_eq!(run.json(), json!("ababab!."));
}

#[test]
fn test_length_error_is_catchable() {
    let run = run_body(
        r#"
        try { "ab".repeat(1e13) } catch (e) { return [e.name, e.message] }
        "#,
    );
    assert_eq!(run.json(), json!(["RangeError", "Invalid string length"]));
}

#[test]
fn test_sparse_index_is_rejected() {
    let run = run_body("const a = []; a[1e12] = 1; return a.length");
    assert_eq!(run.thrown(), "Invalid array length");
}
