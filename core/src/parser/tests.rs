//! Parser tests - verify parsing and AST structure
//!
//! These tests check the shape of the syntax tree only. Evaluation is covered
//! by the executor tests.

use crate::executor::types::ast::{
    AssignOp, BinaryOp, DeclareTarget, Expr, ForLoopKind, FunctionBody, MemberAccess, Stmt,
    TemplatePart, UnaryOp, VarKind,
};
use crate::parser::{self, parse_expression, parse_script};

/* ===================== Handler Shapes ===================== */

#[test]
fn test_parse_export_default_arrow() {
    let program = parse_script("export default async (ctx) => { return ctx.text }")
        .expect("Should parse");
    assert_eq!(program.body.len(), 1);

    match &program.body[0] {
        Stmt::ExportDefault {
            expr:
                Expr::Function {
                    params,
                    is_async: true,
                    body: FunctionBody::Block { .. },
                    ..
                },
            ..
        } => assert_eq!(params, &vec!["ctx".to_string()]),
        other => panic!("Expected async export default, got {:?}", other),
    }
}

#[test]
fn test_parse_bare_async_arrow() {
    let program = parse_script("async (event) => {\n  console.log(event)\n}").expect("Should parse");
    match &program.body[0] {
        Stmt::Expr { expr, .. } => assert!(expr.is_async_function()),
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_parse_legacy_trigger_wrapper() {
    let source = r#"flowops.trigger({ integration: "slack", event: "message" })(async (ctx) => {
        return 1
    })"#;
    let program = parse_script(source).expect("Should parse");

    let Stmt::Expr { expr: Expr::Call { callee, args, .. }, .. } = &program.body[0] else {
        panic!("Expected call statement, got {:?}", program.body[0]);
    };
    assert!(args[0].is_async_function());
    match callee.as_ref() {
        Expr::Call { callee, args, .. } => {
            assert!(matches!(callee.as_ref(), Expr::Member { property, .. } if property == "trigger"));
            assert!(matches!(&args[0], Expr::LitObj { properties, .. } if properties.len() == 2));
        }
        other => panic!("Expected trigger(config) call, got {:?}", other),
    }
}

#[test]
fn test_parse_export_default_function_expression() {
    let program = parse_script("export default async function handle(ctx) { return 1 }")
        .expect("Should parse");
    match &program.body[0] {
        Stmt::ExportDefault {
            expr: Expr::Function { name, is_async, .. },
            ..
        } => {
            assert_eq!(name.as_deref(), Some("handle"));
            assert!(*is_async);
        }
        other => panic!("Expected exported function, got {:?}", other),
    }
}

/* ===================== Statements ===================== */

#[test]
fn test_parse_declarations() {
    let stmt = parser::parse("const { name, email } = ctx\nlet [first, second] = items\nvar n").expect("Should parse");
    let Stmt::Block { body, .. } = stmt else {
        panic!("Expected block");
    };

    match &body[0] {
        Stmt::Declare {
            var_kind: VarKind::Const,
            target: DeclareTarget::Destructure { names, .. },
            init: Some(_),
            ..
        } => assert_eq!(names, &vec!["name".to_string(), "email".to_string()]),
        other => panic!("Expected object destructure, got {:?}", other),
    }
    assert!(matches!(
        &body[1],
        Stmt::Declare {
            var_kind: VarKind::Let,
            target: DeclareTarget::ArrayDestructure { .. },
            ..
        }
    ));
    assert!(matches!(
        &body[2],
        Stmt::Declare {
            var_kind: VarKind::Var,
            init: None,
            ..
        }
    ));
}

#[test]
fn test_parse_assignment_paths() {
    let stmt = parser::parse("result.items[0].count += 2").expect("Should parse");
    let Stmt::Block { body, .. } = stmt else {
        panic!("Expected block");
    };
    match &body[0] {
        Stmt::Assign { var, path, op, .. } => {
            assert_eq!(var, "result");
            assert_eq!(*op, AssignOp::Add);
            assert_eq!(path.len(), 3);
            assert!(matches!(&path[0], MemberAccess::Prop { property, .. } if property == "items"));
            assert!(matches!(&path[1], MemberAccess::Index { .. }));
        }
        other => panic!("Expected assignment, got {:?}", other),
    }
}

#[test]
fn test_parse_update_statement_desugars() {
    let stmt = parser::parse("count--").expect("Should parse");
    let Stmt::Block { body, .. } = stmt else {
        panic!("Expected block");
    };
    assert!(matches!(
        &body[0],
        Stmt::Assign { op: AssignOp::Sub, value: Expr::LitNum { v, .. }, .. } if *v == 1.0
    ));
}

#[test]
fn test_parse_control_flow() {
    let source = r#"
        for (const item of items) {
            if (item.skip) continue
            while (true) { break }
        }
        for (let key in obj) { }
        try { risky() } catch (e) { console.error(e) } finally { done() }
    "#;
    let program = parse_script(source).expect("Should parse");
    assert_eq!(program.body.len(), 3);

    assert!(matches!(
        &program.body[0],
        Stmt::ForLoop { kind: ForLoopKind::Of, var_kind: VarKind::Const, .. }
    ));
    assert!(matches!(&program.body[1], Stmt::ForLoop { kind: ForLoopKind::In, .. }));
    match &program.body[2] {
        Stmt::Try {
            catch_var,
            catch_body,
            finally_body,
            ..
        } => {
            assert_eq!(catch_var.as_deref(), Some("e"));
            assert!(catch_body.is_some());
            assert!(finally_body.is_some());
        }
        other => panic!("Expected try, got {:?}", other),
    }
}

#[test]
fn test_parse_function_declaration() {
    let program = parse_script("async function enrich(lead) { return lead }").expect("Should parse");
    assert!(matches!(
        &program.body[0],
        Stmt::FunctionDecl { name, func: Expr::Function { is_async: true, .. }, .. } if name == "enrich"
    ));
}

#[test]
fn test_parse_comments_are_ignored() {
    let source = "// leading\n/* block\ncomment */ const a = 1 // trailing";
    let program = parse_script(source).expect("Should parse");
    assert_eq!(program.body.len(), 1);
}

/* ===================== Expressions ===================== */

#[test]
fn test_parse_precedence() {
    let expr = parse_expression("1 + 2 * 3").expect("Should parse");
    match expr {
        Expr::BinaryOp {
            op: BinaryOp::Add,
            right,
            ..
        } => assert!(matches!(*right, Expr::BinaryOp { op: BinaryOp::Mul, .. })),
        other => panic!("Expected Add at the root, got {:?}", other),
    }
}

#[test]
fn test_parse_logical_and_nullish() {
    let expr = parse_expression("a ?? b || c").expect("Should parse");
    assert!(matches!(expr, Expr::BinaryOp { op: BinaryOp::Nullish, .. }));

    let expr = parse_expression("x === 1 && !y").expect("Should parse");
    match expr {
        Expr::BinaryOp {
            op: BinaryOp::And,
            left,
            right,
            ..
        } => {
            assert!(matches!(*left, Expr::BinaryOp { op: BinaryOp::StrictEq, .. }));
            assert!(matches!(*right, Expr::Unary { op: UnaryOp::Not, .. }));
        }
        other => panic!("Expected And, got {:?}", other),
    }
}

#[test]
fn test_parse_optional_chain_and_ternary() {
    let expr = parse_expression("user?.profile ? user.profile.name : 'anon'").expect("Should parse");
    match expr {
        Expr::Ternary { condition, .. } => assert!(matches!(
            *condition,
            Expr::Member { optional: true, ref property, .. } if property == "profile"
        )),
        other => panic!("Expected ternary, got {:?}", other),
    }
}

#[test]
fn test_parse_template_literal() {
    let expr = parse_expression("`Hello ${user.name}!`").expect("Should parse");
    match expr {
        Expr::Template { parts, .. } => {
            assert_eq!(parts.len(), 3);
            assert!(matches!(&parts[0], TemplatePart::Text { v } if v == "Hello "));
            assert!(matches!(&parts[1], TemplatePart::Subst { .. }));
        }
        other => panic!("Expected template, got {:?}", other),
    }
}

#[test]
fn test_parse_string_escapes() {
    let expr = parse_expression(r#""line\n\"quoted\"""#).expect("Should parse");
    assert!(matches!(expr, Expr::LitStr { v, .. } if v == "line\n\"quoted\""));
}

#[test]
fn test_parse_object_literal_keys() {
    let expr = parse_expression(r#"({ name, "content-type": 'json', 42: true, default: 1 })"#)
        .expect("Should parse");
    match expr {
        Expr::LitObj { properties, .. } => {
            let keys: Vec<&str> = properties.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["name", "content-type", "42", "default"]);
        }
        other => panic!("Expected object, got {:?}", other),
    }
}

#[test]
fn test_parse_new_and_await() {
    let expr = parse_expression("await new Response('ok', { status: 201 }).json()").expect("Should parse");
    match expr {
        Expr::Await { inner, .. } => match *inner {
            Expr::Call { callee, .. } => {
                assert!(matches!(*callee, Expr::Member { ref object, .. } if matches!(**object, Expr::New { .. })));
            }
            other => panic!("Expected method call, got {:?}", other),
        },
        other => panic!("Expected await, got {:?}", other),
    }
}

#[test]
fn test_parse_arrow_shorthand() {
    let expr = parse_expression("items.map(i => i.id)").expect("Should parse");
    let Expr::Call { args, .. } = expr else {
        panic!("Expected call");
    };
    assert!(matches!(
        &args[0],
        Expr::Function { is_async: false, body: FunctionBody::Expr { .. }, params, .. } if params == &vec!["i".to_string()]
    ));
}

/* ===================== Errors ===================== */

#[test]
fn test_parse_error_reports_position() {
    let err = parse_script("const a = 1\nconst b = )").expect_err("Should fail");
    let span = err.span().expect("Pest errors carry a position");
    assert_eq!(span.start_line, 1);
    assert!(err.summary().starts_with("Unexpected token at line 2"));
}

#[test]
fn test_keywords_are_not_identifiers() {
    assert!(parse_script("const return = 1").is_err());
}

#[test]
fn test_deep_parentheses_rejected_before_parsing() {
    let depth = parser::nesting::MAX_NESTING_DEPTH + 1;
    let source = format!(
        "export default async (ctx) => {{ return {}1{} }}",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    let err = parse_script(&source).expect_err("Should reject");
    assert!(err.summary().starts_with("Nesting too deep"));
}

#[test]
fn test_long_negation_chain_rejected() {
    let source = format!("{}true", "!".repeat(2000));
    let err = parse_script(&source).expect_err("Should reject");
    assert!(err.message().starts_with("Nesting too deep"));
    assert_eq!(err.span().map(|s| s.start_line), Some(0));
}

#[test]
fn test_program_serializes_to_json() {
    let program = parse_script("export default async (ctx) => ctx").expect("Should parse");
    let json = serde_json::to_value(&program).expect("Should serialize");
    assert_eq!(json["body"][0]["t"], "ExportDefault");
}
