//! Syntax Rules
//!
//! Each file in this module contains one rule:
//!
//! - `head_shape.rs` - The script follows a recognized authoring convention
//! - `bracket_balance.rs` - `()`, `[]` and `{}` are balanced
//! - `nesting_depth.rs` - Nesting stays within the parser's depth limit

mod bracket_balance;
mod head_shape;
mod nesting_depth;

pub use bracket_balance::BracketBalanceRule;
pub use head_shape::{HeadShapeRule, INVALID_HEAD_MESSAGE};
pub use nesting_depth::NestingDepthRule;
