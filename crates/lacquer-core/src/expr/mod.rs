// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The expression language (C2): tokenizer, parser, AST, evaluator, and
//! built-in function registry.

mod ast;
mod builtins;
mod eval;
mod parser;
mod token;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use eval::eval;
pub use parser::parse;

use crate::error::Error;
use crate::resolver::VariableResolver;
use crate::value::Value;

/// Parses and evaluates `source` in one call.
pub fn evaluate(source: &str, resolver: &dyn VariableResolver) -> Result<Value, Error> {
    let expr = parse(source)?;
    eval(&expr, resolver)
}
