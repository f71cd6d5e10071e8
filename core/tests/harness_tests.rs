//! End-to-end runs through the public harness API

use flowops_core::executor::Limits;
use flowops_core::{
    execute_workflow, ErrorKind, Harness, LogKind, SandboxSettings, TriggerConfig,
};
use std::time::Duration;

fn result_message(result: &flowops_core::ValidationResult) -> String {
    result
        .result_log()
        .map(|entry| entry.message.clone())
        .unwrap_or_default()
}

/* ===================== Core Scenarios ===================== */

#[tokio::test]
async fn test_default_context_is_used_without_config() {
    let result = execute_workflow("export default async (ctx) => { return ctx.text }", None).await;

    assert!(result.is_valid());
    assert!(result.errors().is_empty());
    assert_eq!(
        result_message(&result),
        r#"Execution result: "Sample message content""#
    );

    let messages: Vec<&str> = result.logs().iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages[0], "Starting workflow execution");
    assert_eq!(messages[1], "Using default trigger configuration");
    assert!(messages[2].starts_with("Using mock context: {"));
    assert_eq!(messages[3], "[SDK] Loading integration: default/default");
}

#[tokio::test]
async fn test_thrown_error_is_a_runtime_error() {
    let result = execute_workflow(
        r#"export default async (ctx) => { throw new Error("boom") }"#,
        None,
    )
    .await;

    assert!(!result.is_valid());
    assert_eq!(result.errors().len(), 1);
    let error = &result.errors()[0];
    assert_eq!(error.kind, ErrorKind::Runtime);
    assert_eq!(error.line, 0);
    assert!(error.message.contains("boom"));

    let last = result.logs().last().unwrap();
    assert_eq!(last.kind, LogKind::Error);
    assert_eq!(last.message, "Execution failed: boom");
    assert!(result.result_log().is_none());
}

#[tokio::test]
async fn test_unmatched_bracket_skips_execution() {
    let script = "export default async (ctx) => {\n  return 1\n}}";
    let result = execute_workflow(script, None).await;

    assert!(!result.is_valid());
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].kind, ErrorKind::Syntax);
    assert_eq!(result.errors()[0].line, 3);
    assert_eq!(result.errors()[0].message, "Unmatched closing bracket: }");

    assert_eq!(result.logs().len(), 1);
    assert_eq!(result.logs()[0].kind, LogKind::Error);
    assert_eq!(result.logs()[0].message, "Syntax validation failed");
}

#[tokio::test]
async fn test_trigger_config_options_reach_the_context() {
    let config = TriggerConfig::new("slack", "message").with_option("channel", "eng");
    let result = execute_workflow(
        "export default async (ctx) => { return ctx.channel }",
        Some(&config),
    )
    .await;

    assert!(result.is_valid());
    assert_eq!(result_message(&result), r#"Execution result: "eng""#);
    assert!(result
        .logs()
        .iter()
        .any(|l| l.message == "Using UI-defined trigger: slack/message"));
}

/* ===================== Properties ===================== */

#[tokio::test]
async fn test_config_beats_script_trigger() {
    let script = r#"trigger({ integration: "slack", event: "message" })(async (ctx) => {
        return ctx.repository
    })"#;
    let config = TriggerConfig::new("github", "push");
    let result = execute_workflow(script, Some(&config)).await;

    assert!(result.is_valid(), "{:?}", result.errors());
    assert_eq!(result_message(&result), r#"Execution result: "username/repo""#);
}

#[tokio::test]
async fn test_script_trigger_drives_sdk() {
    let script = r#"trigger({ integration: "github", event: "push" })(async (ctx) => {
        const pr = await github.create_pr({ title: ctx.commit.message })
        return pr.id
    })"#;
    let result = execute_workflow(script, None).await;

    assert!(result.is_valid(), "{:?}", result.errors());
    assert_eq!(result_message(&result), r#"Execution result: "pr-123""#);
    let messages: Vec<&str> = result.logs().iter().map(|l| l.message.as_str()).collect();
    assert!(messages.contains(&"Trigger detected from code: github/push"));
    assert!(messages.contains(&"[SDK] Loading integration: github/push"));
}

#[tokio::test]
async fn test_validation_is_idempotent() {
    let harness = Harness::default();
    let scripts = [
        "export default async (ctx) => { return ctx.user }",
        "export default async (ctx) => { return ctx.nope.deeper }",
        "const x = (1",
    ];
    for script in scripts {
        let first = harness.execute(script, None).await;
        let second = harness.execute(script, None).await;
        assert_eq!(first.is_valid(), second.is_valid());
        assert_eq!(first.errors(), second.errors());
    }
}

#[tokio::test]
async fn test_is_valid_matches_error_list() {
    let scripts = [
        "export default async (ctx) => ctx",
        "async (ctx) => { console.warn('careful'); return 1 }",
        "not a workflow",
        "export default async (ctx) => { missing() }",
    ];
    for script in scripts {
        let result = execute_workflow(script, None).await;
        assert_eq!(result.is_valid(), result.errors().is_empty(), "{}", script);
    }
}

#[tokio::test]
async fn test_unrecognized_script_reports_head_shape() {
    let result = execute_workflow("console.log('hi')", None).await;
    assert!(!result.is_valid());
    assert_eq!(result.errors()[0].line, 1);
    assert_eq!(result.errors()[0].kind, ErrorKind::Syntax);
}

#[tokio::test]
async fn test_console_output_is_captured_in_order() {
    let result = execute_workflow(
        r#"export default async (ctx) => {
            console.log("first")
            console.warn("second")
            return "done"
        }"#,
        None,
    )
    .await;

    let tail: Vec<(LogKind, &str)> = result
        .logs()
        .iter()
        .skip(4)
        .map(|l| (l.kind, l.message.as_str()))
        .collect();
    assert_eq!(
        tail,
        vec![
            (LogKind::Info, "first"),
            (LogKind::Warning, "second"),
            (LogKind::Result, r#"Execution result: "done""#),
        ]
    );
}

/* ===================== Limits ===================== */

#[tokio::test]
async fn test_deep_nesting_is_a_syntax_error() {
    let script = format!(
        "export default async (ctx) => {{\n  return {}1{}\n}}",
        "(".repeat(80),
        ")".repeat(80)
    );
    let result = execute_workflow(&script, None).await;

    assert!(!result.is_valid());
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].kind, ErrorKind::Syntax);
    assert_eq!(result.errors()[0].line, 2);
    assert!(result.errors()[0].message.starts_with("Nesting too deep"));
}

#[tokio::test]
async fn test_nested_expressions_run_to_completion() {
    let script = format!(
        "export default async (ctx) => {{ return {}ctx.text.length{} }}",
        "(".repeat(40),
        ")".repeat(40)
    );
    let result = execute_workflow(&script, None).await;

    assert!(result.is_valid(), "errors: {:?}", result.errors());
    assert_eq!(result_message(&result), "Execution result: 22");
}

#[tokio::test]
async fn test_circular_result_is_a_runtime_error() {
    let result = execute_workflow(
        r#"export default async (ctx) => { const o = { name: "a" }; o.self = o; return o }"#,
        None,
    )
    .await;

    assert!(!result.is_valid());
    assert_eq!(result.errors()[0].kind, ErrorKind::Runtime);
    assert!(result.errors()[0]
        .message
        .contains("Converting circular structure to JSON"));
}

#[tokio::test]
async fn test_runaway_string_is_a_runtime_error() {
    let result = execute_workflow(
        r#"export default async (ctx) => { let s = "x"; let i = 0; while (i < 60) { s = s + s; i++ } return s.length }"#,
        None,
    )
    .await;

    assert!(!result.is_valid());
    assert_eq!(result.errors()[0].kind, ErrorKind::Runtime);
    assert!(result.errors()[0].message.contains("Invalid string length"));
}

#[tokio::test]
async fn test_hung_script_times_out() {
    let harness = Harness::new(SandboxSettings {
        timeout: Duration::from_millis(100),
        limits: Limits {
            max_steps: u64::MAX,
            max_call_depth: 64,
            ..Limits::default()
        },
    });
    let result = harness
        .execute("export default async (ctx) => { while (true) { } }", None)
        .await;

    assert!(!result.is_valid());
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].kind, ErrorKind::Timeout);
    assert_eq!(result.errors()[0].message, "Execution timed out after 100 ms");
    assert_eq!(
        result.logs().last().map(|l| l.kind),
        Some(LogKind::Error)
    );
}

#[tokio::test]
async fn test_step_budget_is_a_timeout() {
    let harness = Harness::new(SandboxSettings {
        timeout: Duration::from_secs(30),
        limits: Limits {
            max_steps: 2_000,
            max_call_depth: 64,
            ..Limits::default()
        },
    });
    let result = harness
        .execute(
            "export default async (ctx) => { let n = 0; while (n >= 0) { n++ } }",
            None,
        )
        .await;

    assert_eq!(result.errors()[0].kind, ErrorKind::Timeout);
    assert!(result.errors()[0].message.contains("2000 steps"));
}

#[tokio::test]
async fn test_cancellation_stops_the_run() {
    let harness = Harness::default();
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();

    let result = harness
        .execute_with_cancel("export default async (ctx) => { return 1 }", None, cancel)
        .await;

    assert_eq!(result.errors()[0].kind, ErrorKind::Timeout);
    assert_eq!(result.errors()[0].message, "Execution cancelled");
}

#[test]
fn test_blocking_entry_point() {
    let result = tokio_test::block_on(execute_workflow("async (ctx) => ctx.user", None));
    assert!(result.is_valid());
    assert_eq!(result_message(&result), r#"Execution result: "user123""#);
}
