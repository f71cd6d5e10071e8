//! Core language tests: values, operators, scoping, loops

use super::helpers::{run, run_body};
use serde_json::json;

/* ===================== Values & Operators ===================== */

#[test]
fn test_return_context_field() {
    let run = run_body("return ctx.text");
    assert_eq!(run.json(), json!("hello"));
}

#[test]
fn test_arithmetic_and_precedence() {
    let run = run_body("return [1 + 2 * 3, (1 + 2) * 3, 7 % 4, 10 / 4, -ctx.count]");
    assert_eq!(run.json(), json!([7, 9, 3, 2.5, -2]));
}

#[test]
fn test_string_concatenation_and_templates() {
    let run = run_body(
        r#"
        const name = "Ada"
        const greeting = "Hi " + name + "!"
        return `${greeting} You have ${ctx.count + 1} items`
        "#,
    );
    assert_eq!(run.json(), json!("Hi Ada! You have 3 items"));
}

#[test]
fn test_equality_operators() {
    let run = run_body(r#"return [1 == "1", 1 === "1", null == undefined, null === undefined, "a" !== "b"]"#);
    assert_eq!(run.json(), json!([true, false, true, false, true]));
}

#[test]
fn test_logical_operators_short_circuit() {
    let run = run_body(
        r#"
        let calls = 0
        const bump = () => { calls += 1; return true }
        const a = false && bump()
        const b = true || bump()
        const c = null ?? "fallback"
        const d = 0 ?? "unused"
        return { a, b, c, d, calls }
        "#,
    );
    assert_eq!(
        run.json(),
        json!({ "a": false, "b": true, "c": "fallback", "d": 0, "calls": 0 })
    );
}

#[test]
fn test_typeof() {
    let run = run_body(
        r#"return [typeof 1, typeof "s", typeof null, typeof undefined, typeof ctx, typeof (() => 1), typeof missing]"#,
    );
    assert_eq!(
        run.json(),
        json!(["number", "string", "object", "undefined", "object", "function", "undefined"])
    );
}

#[test]
fn test_optional_chaining() {
    let run = run_body(
        r#"
        const profile = null
        return [profile?.name, ctx?.text, ctx.missing?.deep.deeper]
        "#,
    );
    assert_eq!(run.json(), json!([null, "hello", null]));
}

#[test]
fn test_ternary() {
    let run = run_body(r#"return ctx.count > 1 ? "many" : "few""#);
    assert_eq!(run.json(), json!("many"));
}

/* ===================== Bindings ===================== */

#[test]
fn test_destructuring() {
    let run = run_body(
        r#"
        const { text, user, absent } = ctx
        const [first, second] = ["a", "b", "c"]
        return { text, user, absent, first, second }
        "#,
    );
    assert_eq!(
        run.json(),
        json!({ "text": "hello", "user": "U1", "first": "a", "second": "b" })
    );
}

#[test]
fn test_block_scoping_shadows() {
    let run = run_body(
        r#"
        let x = 1
        {
            let x = 2
        }
        if (true) { let x = 3 }
        return x
        "#,
    );
    assert_eq!(run.json(), json!(1));
}

#[test]
fn test_nested_assignment_and_update() {
    let run = run_body(
        r#"
        const state = { counts: { seen: 0 }, items: [] }
        state.counts.seen += 5
        state.counts.seen--
        state.items[2] = "x"
        state["label"] = "done"
        return state
        "#,
    );
    assert_eq!(
        run.json(),
        json!({ "counts": { "seen": 4 }, "items": [null, null, "x"], "label": "done" })
    );
}

#[test]
fn test_closures_capture_by_reference() {
    let run = run_body(
        r#"
        function makeCounter() {
            let n = 0
            return () => { n++; return n }
        }
        const next = makeCounter()
        next()
        next()
        return next()
        "#,
    );
    assert_eq!(run.json(), json!(3));
}

#[test]
fn test_function_declarations_are_hoisted() {
    let run = run(
        r#"
        export default async (ctx) => {
            return double(ctx.count)
        }

        function double(n) {
            return n * 2
        }
        "#,
    );
    assert_eq!(run.json(), json!(4));
}

#[test]
fn test_top_level_statements_run_before_handler() {
    let run = run(
        r#"
        const PREFIX = "ticket-"
        let created = 0
        created += 1

        export default async (ctx) => PREFIX + created
        "#,
    );
    assert_eq!(run.json(), json!("ticket-1"));
}

/* ===================== Loops ===================== */

#[test]
fn test_for_of_with_break_and_continue() {
    let run = run_body(
        r#"
        const out = []
        for (const n of [1, 2, 3, 4, 5, 6]) {
            if (n % 2 === 0) continue
            if (n > 4) break
            out.push(n)
        }
        return out
        "#,
    );
    assert_eq!(run.json(), json!([1, 3]));
}

#[test]
fn test_for_in_iterates_keys() {
    let run = run_body(
        r#"
        const keys = []
        for (const key in { b: 1, a: 2 }) { keys.push(key) }
        return keys
        "#,
    );
    assert_eq!(run.json(), json!(["b", "a"]));
}

#[test]
fn test_while_loop() {
    let run = run_body(
        r#"
        let i = 0
        let total = 0
        while (i < 5) {
            total += i
            i++
        }
        return total
        "#,
    );
    assert_eq!(run.json(), json!(10));
}

#[test]
fn test_for_of_string_characters() {
    let run = run_body(
        r#"
        let out = ""
        for (const ch of "abc") { out = ch + out }
        return out
        "#,
    );
    assert_eq!(run.json(), json!("cba"));
}

/* ===================== Async ===================== */

#[test]
fn test_await_async_helper() {
    let run = run_body(
        r#"
        const load = async (id) => ({ id, ok: true })
        const record = await load(7)
        return record
        "#,
    );
    assert_eq!(run.json(), json!({ "id": 7, "ok": true }));
}

#[test]
fn test_await_non_promise_value() {
    let run = run_body("return await 5");
    assert_eq!(run.json(), json!(5));
}

#[test]
fn test_undefined_result() {
    let run = run_body("const x = 1");
    assert!(matches!(run.result, Ok(crate::executor::Val::Undefined)));
}
