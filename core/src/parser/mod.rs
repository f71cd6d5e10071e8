//! PEST-based parser for workflow scripts
//!
//! Produces the AST consumed by the executor, with span information for error
//! reporting. Trigger-shape recognition and the lexical syntax checks live in
//! the `trigger` and `syntax_validator` submodules; they work on raw text and
//! do not need a successful parse.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};

use crate::executor::types::ast::{
    AssignOp, BinaryOp, DeclareTarget, Expr, ForLoopKind, FunctionBody, MemberAccess, Span, Stmt,
    TemplatePart, UnaryOp, VarKind,
};

pub mod nesting;
pub mod syntax_validator;
pub mod trigger;

#[cfg(test)]
mod tests;

/* ===================== Program ===================== */

/// A parsed workflow script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Top-level statements in source order
    pub body: Vec<Stmt>,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/script.pest"]
struct ScriptParser;

/* ===================== Error Types ===================== */

#[derive(Debug)]
pub enum ParseError {
    PestError(String, Option<Span>),
    BuildError(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) => msg,
            ParseError::BuildError(msg, _) => msg,
        }
    }

    /// One-line description suitable for a runtime error message
    pub fn summary(&self) -> String {
        match self {
            ParseError::PestError(_, Some(span)) => format!(
                "Unexpected token at line {}, column {}",
                span.start_line + 1,
                span.start_col + 1
            ),
            _ => self.message().lines().next().unwrap_or_default().to_string(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::PestError(msg, _) => write!(f, "{}", msg),
            ParseError::BuildError(msg, _) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Some(Span {
                start: 0,
                end: 0,
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
            }),
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Some(Span {
                    start: 0,
                    end: 0,
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                })
            }
        };
        ParseError::PestError(err.to_string(), span)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>, source: &str) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let end = pest_span.end();

    let (start_line, start_col) = offset_to_line_col(source, start);
    let (end_line, end_col) = offset_to_line_col(source, end);

    Span::new(start, end, start_line, start_col, end_line, end_col)
}

/// Convert byte offset to (line, column) - 0-indexed
pub(crate) fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    let mut current_offset = 0;

    for ch in source.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

/// Pull the next child pair, turning grammar/builder drift into an error
fn next_pair<'i>(inner: &mut Pairs<'i, Rule>, span: Span, what: &str) -> ParseResult<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("Missing {}", what), Some(span)))
}

/* ===================== Public API ===================== */

/// Parse a workflow script into a program
///
/// Scripts nesting deeper than [`nesting::MAX_NESTING_DEPTH`] are rejected
/// before the grammar runs.
pub fn parse_script(source: &str) -> ParseResult<Program> {
    if let Some(overflow) = nesting::find_nesting_overflow(source, nesting::MAX_NESTING_DEPTH) {
        let line = overflow.line.saturating_sub(1);
        let col = overflow.col.saturating_sub(1);
        return Err(ParseError::BuildError(
            overflow.message(),
            Some(Span::new(0, 0, line, col, line, col + 1)),
        ));
    }

    let mut pairs = ScriptParser::parse(Rule::program, source)?;
    let program = pairs
        .next()
        .ok_or_else(|| ParseError::BuildError("Empty parse result".to_string(), None))?;
    let span = pair_to_span(&program, source);

    let body = program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(|p| build_statement(p, source))
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(Program { body, span })
}

/// Parse a script into a single block statement (testing API)
pub fn parse(source: &str) -> ParseResult<Stmt> {
    let program = parse_script(source)?;
    Ok(Stmt::Block {
        body: program.body,
        span: program.span,
    })
}

/// Parse a standalone expression (testing API)
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let program = parse_script(source)?;
    match program.body.into_iter().next() {
        Some(Stmt::Expr { expr, .. }) => Ok(expr),
        _ => Err(ParseError::BuildError(
            "Expected a single expression".to_string(),
            Some(program.span),
        )),
    }
}

/* ===================== Statement Builder ===================== */

fn build_statement(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::statement => {
            let inner = next_pair(&mut pair.into_inner(), span, "statement body")?;
            build_statement(inner, source)
        }
        Rule::export_default_stmt => {
            let expr_pair = next_pair(&mut pair.into_inner(), span, "exported expression")?;
            let expr = build_expression(expr_pair, source)?;
            Ok(Stmt::ExportDefault { expr, span })
        }
        Rule::function_decl => build_function_decl(pair, source),
        Rule::declare_stmt => build_declare_stmt(pair, source),
        Rule::if_stmt => build_if_stmt(pair, source),
        Rule::while_stmt => build_while_stmt(pair, source),
        Rule::for_loop_stmt => build_for_loop_stmt(pair, source),
        Rule::try_stmt => build_try_stmt(pair, source),
        Rule::return_stmt => {
            let value = match pair.into_inner().next() {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Stmt::Return { value, span })
        }
        Rule::throw_stmt => {
            let expr_pair = next_pair(&mut pair.into_inner(), span, "thrown expression")?;
            let value = build_expression(expr_pair, source)?;
            Ok(Stmt::Throw { value, span })
        }
        Rule::break_stmt => Ok(Stmt::Break { span }),
        Rule::continue_stmt => Ok(Stmt::Continue { span }),
        Rule::empty_stmt => Ok(Stmt::Block { body: vec![], span }),
        Rule::block => build_block(pair, source),
        Rule::update_stmt => build_update_stmt(pair, source),
        Rule::assign_stmt => build_assign_stmt(pair, source),
        Rule::expr_stmt => {
            let expr_pair = next_pair(&mut pair.into_inner(), span, "expression")?;
            let expr = build_expression(expr_pair, source)?;
            Ok(Stmt::Expr { expr, span })
        }
        _ => Err(ParseError::BuildError(
            format!("Unexpected statement rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_block(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let body = pair
        .into_inner()
        .map(|stmt_pair| build_statement(stmt_pair, source))
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(Stmt::Block { body, span })
}

fn build_function_decl(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner().peekable();

    let is_async = matches!(inner.peek().map(|p| p.as_rule()), Some(Rule::async_kw));
    if is_async {
        inner.next();
    }

    let name_pair = inner
        .next()
        .ok_or_else(|| ParseError::BuildError("Missing function name".to_string(), Some(span)))?;
    let name = name_pair.as_str().to_string();
    let params_pair = inner
        .next()
        .ok_or_else(|| ParseError::BuildError("Missing parameter list".to_string(), Some(span)))?;
    let params = build_params(params_pair);
    let body_pair = inner
        .next()
        .ok_or_else(|| ParseError::BuildError("Missing function body".to_string(), Some(span)))?;
    let body = build_block(body_pair, source)?;

    Ok(Stmt::FunctionDecl {
        name: name.clone(),
        func: Expr::Function {
            name: Some(name),
            params,
            is_async,
            body: FunctionBody::Block {
                stmt: Box::new(body),
            },
            span,
        },
        span,
    })
}

fn build_params(pair: Pair<Rule>) -> Vec<String> {
    match pair.as_rule() {
        Rule::identifier => vec![pair.as_str().to_string()],
        _ => pair.into_inner().map(|p| p.as_str().to_string()).collect(),
    }
}

fn build_declare_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let kind_pair = next_pair(&mut inner, span, "declaration kind")?;
    let var_kind = build_var_kind(&kind_pair);
    let target_pair = next_pair(&mut inner, span, "declaration target")?;
    let target = build_declare_target(target_pair, source)?;
    let init = match inner.next() {
        Some(expr_pair) => Some(build_expression(expr_pair, source)?),
        None => None,
    };

    Ok(Stmt::Declare {
        var_kind,
        target,
        init,
        span,
    })
}

fn build_var_kind(pair: &Pair<Rule>) -> VarKind {
    match pair.as_str() {
        "const" => VarKind::Const,
        "var" => VarKind::Var,
        _ => VarKind::Let,
    }
}

fn build_declare_target(pair: Pair<Rule>, source: &str) -> ParseResult<DeclareTarget> {
    let span = pair_to_span(&pair, source);
    let inner = match pair.as_rule() {
        Rule::binding_target => next_pair(&mut pair.into_inner(), span, "binding")?,
        _ => pair,
    };

    match inner.as_rule() {
        Rule::identifier => Ok(DeclareTarget::Simple {
            name: inner.as_str().to_string(),
            span,
        }),
        Rule::destructure_pattern => Ok(DeclareTarget::Destructure {
            names: inner.into_inner().map(|p| p.as_str().to_string()).collect(),
            span,
        }),
        Rule::array_pattern => Ok(DeclareTarget::ArrayDestructure {
            names: inner.into_inner().map(|p| p.as_str().to_string()).collect(),
            span,
        }),
        _ => Err(ParseError::BuildError(
            format!("Unexpected declaration target: {:?}", inner.as_rule()),
            Some(span),
        )),
    }
}

fn build_if_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let test = build_expression(next_pair(&mut inner, span, "if condition")?, source)?;
    let then_s = build_statement(next_pair(&mut inner, span, "if body")?, source)?;
    let else_s = match inner.next() {
        Some(else_pair) => Some(Box::new(build_statement(else_pair, source)?)),
        None => None,
    };

    Ok(Stmt::If {
        test,
        then_s: Box::new(then_s),
        else_s,
        span,
    })
}

fn build_while_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let test = build_expression(next_pair(&mut inner, span, "while condition")?, source)?;
    let body = build_statement(next_pair(&mut inner, span, "while body")?, source)?;

    Ok(Stmt::While {
        test,
        body: Box::new(body),
        span,
    })
}

fn build_for_loop_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let var_kind = build_var_kind(&next_pair(&mut inner, span, "loop variable kind")?);
    let binding = build_declare_target(next_pair(&mut inner, span, "loop binding")?, source)?;
    let kind = match next_pair(&mut inner, span, "'of' or 'in'")?.as_str() {
        "in" => ForLoopKind::In,
        _ => ForLoopKind::Of,
    };
    let iterable = build_expression(next_pair(&mut inner, span, "loop iterable")?, source)?;
    let body = build_statement(next_pair(&mut inner, span, "loop body")?, source)?;

    Ok(Stmt::ForLoop {
        kind,
        var_kind,
        binding,
        iterable,
        body: Box::new(body),
        span,
    })
}

fn build_try_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let body = build_block(next_pair(&mut inner, span, "try block")?, source)?;
    let mut catch_var = None;
    let mut catch_body = None;
    let mut finally_body = None;

    for clause in inner {
        match clause.as_rule() {
            Rule::catch_clause => {
                for part in clause.into_inner() {
                    match part.as_rule() {
                        Rule::identifier => catch_var = Some(part.as_str().to_string()),
                        _ => catch_body = Some(Box::new(build_block(part, source)?)),
                    }
                }
            }
            Rule::finally_clause => {
                let block_pair = next_pair(&mut clause.into_inner(), span, "finally block")?;
                finally_body = Some(Box::new(build_block(block_pair, source)?));
            }
            rule => {
                return Err(ParseError::BuildError(
                    format!("Unexpected try clause: {:?}", rule),
                    Some(span),
                ))
            }
        }
    }

    if catch_body.is_none() && finally_body.is_none() {
        return Err(ParseError::BuildError(
            "Missing catch or finally after try".to_string(),
            Some(span),
        ));
    }

    Ok(Stmt::Try {
        body: Box::new(body),
        catch_var,
        catch_body,
        finally_body,
        span,
    })
}

/// Split an assignment target into the root variable and its member path
fn build_assign_target(
    pair: Pair<Rule>,
    source: &str,
) -> ParseResult<(String, Vec<MemberAccess>)> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let var = next_pair(&mut inner, span, "assignment variable")?
        .as_str()
        .to_string();

    let mut path = Vec::new();
    for segment in inner {
        let segment_span = pair_to_span(&segment, source);
        let seg_inner = next_pair(&mut segment.into_inner(), segment_span, "path segment")?;
        match seg_inner.as_rule() {
            Rule::property_name => path.push(MemberAccess::Prop {
                property: seg_inner.as_str().to_string(),
                span: segment_span,
            }),
            _ => path.push(MemberAccess::Index {
                expr: build_expression(seg_inner, source)?,
                span: segment_span,
            }),
        }
    }

    Ok((var, path))
}

fn build_assign_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let (var, path) = build_assign_target(next_pair(&mut inner, span, "assignment target")?, source)?;
    let op = match next_pair(&mut inner, span, "assignment operator")?.as_str() {
        "+=" => AssignOp::Add,
        "-=" => AssignOp::Sub,
        _ => AssignOp::Set,
    };
    let value = build_expression(next_pair(&mut inner, span, "assigned value")?, source)?;

    Ok(Stmt::Assign {
        var,
        path,
        op,
        value,
        span,
    })
}

/// `x++` / `x--` become `x += 1` / `x -= 1`
fn build_update_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let (var, path) = build_assign_target(next_pair(&mut inner, span, "update target")?, source)?;
    let op = match next_pair(&mut inner, span, "update operator")?.as_str() {
        "--" => AssignOp::Sub,
        _ => AssignOp::Add,
    };

    Ok(Stmt::Assign {
        var,
        path,
        op,
        value: Expr::LitNum { v: 1.0, span },
        span,
    })
}

/* ===================== Expression Builder ===================== */

fn binary_op_for(rule: Rule) -> Option<BinaryOp> {
    let op = match rule {
        Rule::op_nullish => BinaryOp::Nullish,
        Rule::op_or => BinaryOp::Or,
        Rule::op_and => BinaryOp::And,
        Rule::op_strict_eq => BinaryOp::StrictEq,
        Rule::op_strict_ne => BinaryOp::StrictNe,
        Rule::op_eq => BinaryOp::Eq,
        Rule::op_ne => BinaryOp::Ne,
        Rule::op_lt => BinaryOp::Lt,
        Rule::op_lte => BinaryOp::Lte,
        Rule::op_gt => BinaryOp::Gt,
        Rule::op_gte => BinaryOp::Gte,
        Rule::op_add => BinaryOp::Add,
        Rule::op_sub => BinaryOp::Sub,
        Rule::op_mul => BinaryOp::Mul,
        Rule::op_div => BinaryOp::Div,
        Rule::op_mod => BinaryOp::Mod,
        _ => return None,
    };
    Some(op)
}

/// Fold `operand (op operand)*` left-associatively
fn build_binary_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let mut left = build_expression(next_pair(&mut inner, span, "left operand")?, source)?;

    while let Some(op_pair) = inner.next() {
        let op = binary_op_for(op_pair.as_rule()).ok_or_else(|| {
            ParseError::BuildError(
                format!("Expected operator, got {:?}", op_pair.as_rule()),
                Some(span),
            )
        })?;
        let right_pair = inner.next().ok_or_else(|| {
            ParseError::BuildError(
                "Missing right operand after operator".to_string(),
                Some(span),
            )
        })?;
        let right = build_expression(right_pair, source)?;
        let new_span = left.span().merge(&right.span());

        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: new_span,
        };
    }

    Ok(left)
}

fn build_expression(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::expression | Rule::primary | Rule::literal => {
            let inner = next_pair(&mut pair.into_inner(), span, "expression")?;
            build_expression(inner, source)
        }
        Rule::arrow_function => build_arrow_function(pair, source),
        Rule::ternary_expr => {
            let mut inner = pair.into_inner();
            let condition = build_expression(next_pair(&mut inner, span, "condition")?, source)?;

            match inner.next() {
                Some(consequent_pair) => {
                    let consequent = build_expression(consequent_pair, source)?;
                    let alternate =
                        build_expression(next_pair(&mut inner, span, "ternary else branch")?, source)?;
                    Ok(Expr::Ternary {
                        condition: Box::new(condition),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                        span,
                    })
                }
                None => Ok(condition),
            }
        }
        Rule::nullish_expr
        | Rule::logical_or_expr
        | Rule::logical_and_expr
        | Rule::equality_expr
        | Rule::comparison_expr
        | Rule::additive_expr
        | Rule::multiplicative_expr => build_binary_expr(pair, source),
        Rule::unary_expr => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner, span, "unary operand")?;

            let op = match first.as_rule() {
                Rule::op_not => UnaryOp::Not,
                Rule::op_neg => UnaryOp::Neg,
                Rule::op_typeof => UnaryOp::TypeOf,
                _ => return build_expression(first, source),
            };
            let operand = build_expression(next_pair(&mut inner, span, "unary operand")?, source)?;
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            })
        }
        Rule::await_expr => {
            let inner_pair = next_pair(&mut pair.into_inner(), span, "awaited expression")?;
            let inner_expr = build_expression(inner_pair, source)?;
            Ok(Expr::Await {
                inner: Box::new(inner_expr),
                span,
            })
        }
        Rule::call_expr => build_call_expr(pair, source),
        Rule::new_expr => {
            let mut inner = pair.into_inner();
            let constructor = next_pair(&mut inner, span, "constructor name")?
                .as_str()
                .to_string();
            let args = match inner.next() {
                Some(suffix) => build_call_args(suffix, source)?,
                None => vec![],
            };
            Ok(Expr::New {
                constructor,
                args,
                span,
            })
        }
        Rule::function_expr => build_function_expr(pair, source),
        Rule::identifier => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
            span,
        }),
        Rule::number => {
            let num_str = pair.as_str();
            let value = num_str.parse::<f64>().map_err(|e| {
                ParseError::BuildError(
                    format!("Failed to parse number '{}': {}", num_str, e),
                    Some(span),
                )
            })?;
            Ok(Expr::LitNum { v: value, span })
        }
        Rule::boolean => Ok(Expr::LitBool {
            v: pair.as_str() == "true",
            span,
        }),
        Rule::null_lit => Ok(Expr::LitNull { span }),
        Rule::undefined_lit => Ok(Expr::LitUndefined { span }),
        Rule::string => Ok(Expr::LitStr {
            v: string_value(pair),
            span,
        }),
        Rule::template => {
            let parts = pair
                .into_inner()
                .map(|part| match part.as_rule() {
                    Rule::template_text => Ok(TemplatePart::Text {
                        v: unescape(part.as_str()),
                    }),
                    _ => {
                        let part_span = pair_to_span(&part, source);
                        let expr_pair = next_pair(&mut part.into_inner(), part_span, "substitution")?;
                        Ok(TemplatePart::Subst {
                            expr: build_expression(expr_pair, source)?,
                        })
                    }
                })
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expr::Template { parts, span })
        }
        Rule::object_lit => build_object_literal(pair, source),
        Rule::array_lit => build_array_literal(pair, source),
        _ => Err(ParseError::BuildError(
            format!("Unexpected expression rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_call_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let mut expr = build_expression(next_pair(&mut inner, span, "callee")?, source)?;

    for postfix_pair in inner {
        let postfix_span = pair_to_span(&postfix_pair, source);
        let postfix_inner = next_pair(&mut postfix_pair.into_inner(), postfix_span, "postfix")?;
        let new_span = expr.span().merge(&postfix_span);

        expr = match postfix_inner.as_rule() {
            Rule::call_suffix => Expr::Call {
                callee: Box::new(expr),
                args: build_call_args(postfix_inner, source)?,
                span: new_span,
            },
            Rule::optional_access | Rule::regular_access => {
                let optional = postfix_inner.as_rule() == Rule::optional_access;
                let prop_pair = next_pair(&mut postfix_inner.into_inner(), postfix_span, "property")?;
                Expr::Member {
                    object: Box::new(expr),
                    property: prop_pair.as_str().to_string(),
                    optional,
                    span: new_span,
                }
            }
            Rule::index_access => {
                let index_pair = next_pair(&mut postfix_inner.into_inner(), postfix_span, "index")?;
                Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(build_expression(index_pair, source)?),
                    span: new_span,
                }
            }
            rule => {
                return Err(ParseError::BuildError(
                    format!("Unexpected postfix rule: {:?}", rule),
                    Some(postfix_span),
                ))
            }
        };
    }

    Ok(expr)
}

fn build_call_args(suffix: Pair<Rule>, source: &str) -> ParseResult<Vec<Expr>> {
    match suffix.into_inner().next() {
        Some(arg_list) => arg_list
            .into_inner()
            .map(|expr_pair| build_expression(expr_pair, source))
            .collect(),
        None => Ok(vec![]),
    }
}

fn build_arrow_function(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner().peekable();

    let is_async = matches!(inner.peek().map(|p| p.as_rule()), Some(Rule::async_kw));
    if is_async {
        inner.next();
    }

    let params_pair = inner
        .next()
        .ok_or_else(|| ParseError::BuildError("Missing arrow parameters".to_string(), Some(span)))?;
    let params_span = pair_to_span(&params_pair, source);
    let params = build_params(next_pair(&mut params_pair.into_inner(), params_span, "parameters")?);

    let body_pair = inner
        .next()
        .ok_or_else(|| ParseError::BuildError("Missing arrow body".to_string(), Some(span)))?;
    let body_span = pair_to_span(&body_pair, source);
    let body_inner = next_pair(&mut body_pair.into_inner(), body_span, "arrow body")?;
    let body = match body_inner.as_rule() {
        Rule::block => FunctionBody::Block {
            stmt: Box::new(build_block(body_inner, source)?),
        },
        _ => FunctionBody::Expr {
            expr: Box::new(build_expression(body_inner, source)?),
        },
    };

    Ok(Expr::Function {
        name: None,
        params,
        is_async,
        body,
        span,
    })
}

fn build_function_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut is_async = false;
    let mut name = None;
    let mut params = Vec::new();
    let mut body = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::async_kw => is_async = true,
            Rule::identifier => name = Some(part.as_str().to_string()),
            Rule::param_list => params = build_params(part),
            Rule::block => body = Some(build_block(part, source)?),
            rule => {
                return Err(ParseError::BuildError(
                    format!("Unexpected function part: {:?}", rule),
                    Some(span),
                ))
            }
        }
    }

    let body = body
        .ok_or_else(|| ParseError::BuildError("Missing function body".to_string(), Some(span)))?;
    Ok(Expr::Function {
        name,
        params,
        is_async,
        body: FunctionBody::Block {
            stmt: Box::new(body),
        },
        span,
    })
}

fn build_object_literal(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    let properties = match pair.into_inner().next() {
        Some(property_list_pair) => property_list_pair
            .into_inner()
            .map(|property_pair| build_property(property_pair, source))
            .collect::<ParseResult<Vec<_>>>()?,
        None => vec![],
    };

    Ok(Expr::LitObj { properties, span })
}

fn build_property(pair: Pair<Rule>, source: &str) -> ParseResult<(String, Expr)> {
    let span = pair_to_span(&pair, source);
    let inner = next_pair(&mut pair.into_inner(), span, "property")?;
    let inner_span = pair_to_span(&inner, source);

    match inner.as_rule() {
        Rule::property_pair => {
            let mut inner_pairs = inner.into_inner();
            let key_pair = next_pair(&mut inner_pairs, inner_span, "property key")?;
            let key_inner = next_pair(&mut key_pair.into_inner(), inner_span, "property key")?;
            let key = match key_inner.as_rule() {
                Rule::string => string_value(key_inner),
                _ => key_inner.as_str().to_string(),
            };
            let value = build_expression(next_pair(&mut inner_pairs, inner_span, "property value")?, source)?;
            Ok((key, value))
        }
        Rule::property_shorthand => {
            let key = inner.as_str().trim().to_string();
            let value = Expr::Ident {
                name: key.clone(),
                span: inner_span,
            };
            Ok((key, value))
        }
        _ => Err(ParseError::BuildError(
            format!("Unexpected property rule: {:?}", inner.as_rule()),
            Some(inner_span),
        )),
    }
}

fn build_array_literal(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    let elements = match pair.into_inner().next() {
        Some(element_list_pair) => element_list_pair
            .into_inner()
            .map(|expr_pair| build_expression(expr_pair, source))
            .collect::<ParseResult<Vec<_>>>()?,
        None => vec![],
    };

    Ok(Expr::LitList { elements, span })
}

/* ===================== String Literals ===================== */

fn string_value(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|content| unescape(content.as_str()))
        .unwrap_or_default()
}

/// Resolve backslash escapes in string and template text
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
