// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single recursive evaluator for the expression AST (§9: no virtual
//! dispatch needed).

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::builtins;
use crate::error::Error;
use crate::resolver::VariableResolver;
use crate::value::Value;

pub fn eval(expr: &Expr, resolver: &dyn VariableResolver) -> Result<Value, Error> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),

        Expr::Identifier(name) => {
            if is_root_scope(name) {
                resolver.resolve(std::slice::from_ref(name))
            } else {
                Err(Error::Scope { scope: name.clone() })
            }
        }

        Expr::Unary(op, inner) => {
            let value = eval(inner, resolver)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!value.to_bool()),
                UnaryOp::Neg => Value::Number(-value.to_number()),
            })
        }

        Expr::Binary(BinaryOp::And, left, right) => {
            let l = eval(left, resolver)?;
            if !l.to_bool() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(right, resolver)?.to_bool()))
        }

        Expr::Binary(BinaryOp::Or, left, right) => {
            let l = eval(left, resolver)?;
            if l.to_bool() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(right, resolver)?.to_bool()))
        }

        Expr::Binary(op, left, right) => {
            let l = eval(left, resolver)?;
            let r = eval(right, resolver)?;
            eval_binary(*op, l, r)
        }

        Expr::Ternary(cond, then_branch, else_branch) => {
            if eval(cond, resolver)?.to_bool() {
                eval(then_branch, resolver)
            } else {
                eval(else_branch, resolver)
            }
        }

        Expr::Call(name, arg_exprs) => {
            let mut args = Vec::with_capacity(arg_exprs.len());
            for a in arg_exprs {
                args.push(eval(a, resolver)?);
            }
            builtins::call(name, &args, resolver)
        }

        Expr::Property(_, _) => eval_property_or_index(expr, resolver),
        Expr::Index(_, _) => eval_property_or_index(expr, resolver),
    }
}

fn is_root_scope(name: &str) -> bool {
    matches!(name, "inputs" | "state" | "steps" | "metadata" | "env" | "workflow")
}

/// Walks a pure dot-chain (`Property` nodes only) down to its root
/// identifier. Used to detect when a `Property`/`Index` expression should be
/// delegated whole to the Variable Resolver (§4.2's "Dot access where the
/// LHS is the root identifier ... is intercepted").
fn dotted_root_path(expr: &Expr) -> Option<(String, Vec<String>)> {
    match expr {
        Expr::Identifier(name) if is_root_scope(name) => Some((name.clone(), Vec::new())),
        Expr::Property(base, field) => {
            let (root, mut segments) = dotted_root_path(base)?;
            segments.push(field.clone());
            Some((root, segments))
        }
        _ => None,
    }
}

fn eval_property_or_index(expr: &Expr, resolver: &dyn VariableResolver) -> Result<Value, Error> {
    if let Some((root, mut segments)) = dotted_root_path(expr) {
        let mut path = vec![root];
        path.append(&mut segments);
        return resolver.resolve(&path);
    }

    match expr {
        Expr::Property(base, field) => {
            let base_value = eval(base, resolver)?;
            match base_value {
                Value::Map(m) => Ok(m.get(field).cloned().unwrap_or(Value::Null)),
                Value::Null => Ok(Value::Null),
                _ => Err(Error::type_error(format!("cannot access field '{field}' on a non-map value"))),
            }
        }
        Expr::Index(base, index_expr) => {
            let base_value = eval(base, resolver)?;
            let index_value = eval(index_expr, resolver)?;
            index_into(&base_value, &index_value)
        }
        _ => unreachable!("eval_property_or_index called on non-property/index expr"),
    }
}

fn index_into(base: &Value, index: &Value) -> Result<Value, Error> {
    match base {
        Value::List(items) => {
            let i = index.to_number() as i64;
            let len = items.len();
            let resolved = if i < 0 { i + len as i64 } else { i };
            if resolved < 0 || resolved as usize >= len {
                return Err(Error::Index { index: i, len });
            }
            Ok(items[resolved as usize].clone())
        }
        Value::Map(m) => {
            let key = match index {
                Value::String(s) => s.clone(),
                other => other.to_text(),
            };
            Ok(m.get(&key).cloned().unwrap_or(Value::Null))
        }
        _ => Err(Error::type_error("cannot index into this value type")),
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, Error> {
    use BinaryOp::*;

    match op {
        Add => {
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                Ok(Value::String(format!("{}{}", left.to_text(), right.to_text())))
            } else {
                Ok(Value::Number(left.to_number() + right.to_number()))
            }
        }
        Sub => Ok(Value::Number(left.to_number() - right.to_number())),
        Mul => Ok(Value::Number(left.to_number() * right.to_number())),
        Div => {
            let r = right.to_number();
            if r == 0.0 {
                return Err(Error::Arithmetic { message: "division by zero".to_string() });
            }
            Ok(Value::Number(left.to_number() / r))
        }
        Mod => {
            let r = right.to_number() as i64;
            if r == 0 {
                return Err(Error::Arithmetic { message: "modulo by zero".to_string() });
            }
            Ok(Value::Number((left.to_number() as i64 % r) as f64))
        }
        Eq => Ok(Value::Bool(left.loose_eq(&right))),
        Ne => Ok(Value::Bool(!left.loose_eq(&right))),
        Lt => Ok(Value::Bool(left.to_number() < right.to_number())),
        Gt => Ok(Value::Bool(left.to_number() > right.to_number())),
        Le => Ok(Value::Bool(left.to_number() <= right.to_number())),
        Ge => Ok(Value::Bool(left.to_number() >= right.to_number())),
        And | Or => unreachable!("short-circuit operators handled separately"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use crate::resolver::tests::TestResolver;

    #[test]
    fn test_arithmetic_template_scenario() {
        let resolver = TestResolver::with_inputs(&[("count", Value::Number(3.0))]);
        let expr = parse("inputs.count * 2 + 1").unwrap();
        assert_eq!(eval(&expr, &resolver).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn test_ternary_scenario() {
        let resolver = TestResolver::with_inputs(&[("enabled", Value::Bool(true))]);
        let expr = parse("inputs.enabled ? 'on' : 'off'").unwrap();
        assert_eq!(eval(&expr, &resolver).unwrap(), Value::String("on".to_string()));
    }

    #[test]
    fn test_string_concat() {
        let resolver = TestResolver::with_inputs(&[]);
        let expr = parse("'a' + 'b'").unwrap();
        assert_eq!(eval(&expr, &resolver).unwrap(), Value::String("ab".to_string()));
    }

    #[test]
    fn test_division_by_zero() {
        let resolver = TestResolver::with_inputs(&[]);
        let expr = parse("1 / 0").unwrap();
        assert!(matches!(eval(&expr, &resolver), Err(Error::Arithmetic { .. })));
    }

    #[test]
    fn test_list_index_out_of_range() {
        let resolver = TestResolver::with_inputs(&[("xs", Value::List(vec![Value::Number(1.0)]))]);
        let expr = parse("inputs.xs[5]").unwrap();
        assert!(matches!(eval(&expr, &resolver), Err(Error::Index { .. })));
    }

    #[test]
    fn test_missing_map_key_is_null_not_error() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("a".to_string(), Value::Number(1.0));
        let resolver = TestResolver::with_inputs(&[("m", Value::Map(map))]);
        let expr = parse("inputs.m.missing").unwrap();
        assert_eq!(eval(&expr, &resolver).unwrap(), Value::Null);
    }

    #[test]
    fn test_unknown_function_is_name_error() {
        let resolver = TestResolver::with_inputs(&[]);
        let expr = parse("nope()").unwrap();
        assert!(matches!(eval(&expr, &resolver), Err(Error::Name { .. })));
    }
}
