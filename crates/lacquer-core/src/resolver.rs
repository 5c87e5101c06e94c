// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Variable Resolver (C4): resolves rooted paths (`inputs.*`, `state.*`,
//! `steps.*.…`, `metadata.*`, `env.*`, `workflow.*`) against the execution
//! context. The concrete data source is `ExecutionContext` (C5); this module
//! defines the contract and the generic "apply the rest of the path"
//! semantics shared by every root.

use crate::error::Error;
use crate::value::Value;

/// Implemented by the Execution Context. The expression evaluator (C2)
/// delegates any dot-chain bottoming at a recognized root identifier to
/// this trait instead of doing generic map lookups, so that root-specific
/// "missing" semantics (`NotFound` vs. an empty string vs. `Null`) apply.
pub trait VariableResolver: Send + Sync {
    /// `path[0]` is the root scope name; `path[1..]` are dotted segments
    /// under it.
    fn resolve(&self, path: &[String]) -> Result<Value, Error>;

    fn is_cancelled(&self) -> bool;

    /// True iff any recorded `StepResult` in the current scope has status
    /// `Failed` — backs the `success()`/`failure()` built-ins.
    fn any_step_failed(&self) -> bool;
}

/// Applies `path` to `value` using plain C2 dot-access semantics: a missing
/// map key is `Null`, not an error. Used once a root lookup has produced a
/// base value and resolution continues past the first root-owned segment.
pub fn nested_get(value: &Value, path: &[String]) -> Value {
    let mut current = value.clone();
    for segment in path {
        current = match current {
            Value::Map(ref m) => m.get(segment).cloned().unwrap_or(Value::Null),
            Value::Null => Value::Null,
            _ => Value::Null,
        };
    }
    current
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Minimal resolver used only by the expression-language unit tests:
    /// backs `inputs.*` from a fixed map and treats every other root as
    /// empty.
    pub struct TestResolver {
        inputs: BTreeMap<String, Value>,
    }

    impl TestResolver {
        pub fn with_inputs(pairs: &[(&str, Value)]) -> Self {
            Self {
                inputs: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            }
        }
    }

    impl VariableResolver for TestResolver {
        fn resolve(&self, path: &[String]) -> Result<Value, Error> {
            match path.first().map(String::as_str) {
                Some("inputs") => {
                    if path.len() == 1 {
                        return Ok(Value::Map(self.inputs.clone()));
                    }
                    let key = &path[1];
                    let value = self.inputs.get(key).cloned().ok_or_else(|| Error::not_found(format!("inputs.{key}")))?;
                    Ok(nested_get(&value, &path[2..]))
                }
                Some("env") => Ok(Value::String(String::new())),
                Some(root @ ("state" | "steps" | "metadata" | "workflow")) => {
                    Err(Error::not_found(format!("{root}.{}", path.get(1).cloned().unwrap_or_default())))
                }
                Some(other) => Err(Error::Scope { scope: other.to_string() }),
                None => Err(Error::Scope { scope: String::new() }),
            }
        }

        fn is_cancelled(&self) -> bool {
            false
        }

        fn any_step_failed(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_missing_input_key_is_not_found() {
        let resolver = TestResolver::with_inputs(&[]);
        let result = resolver.resolve(&["inputs".to_string(), "missing".to_string()]);
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_unknown_root_is_scope_error() {
        let resolver = TestResolver::with_inputs(&[]);
        let result = resolver.resolve(&["bogus".to_string()]);
        assert!(matches!(result, Err(Error::Scope { .. })));
    }

    #[test]
    fn test_env_missing_is_empty_string_not_error() {
        let resolver = TestResolver::with_inputs(&[]);
        let result = resolver.resolve(&["env".to_string(), "MISSING".to_string()]).unwrap();
        assert_eq!(result, Value::String(String::new()));
    }
}
