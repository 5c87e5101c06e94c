// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in function registry: a `&'static` lookup table built once at
//! process start (§4.2), not per-evaluation.

use crate::error::Error;
use crate::resolver::VariableResolver;
use crate::value::Value;
use once_cell::sync::Lazy;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

type BuiltinFn = fn(&[Value], &dyn VariableResolver) -> Result<Value, Error>;

static REGISTRY: Lazy<HashMap<&'static str, BuiltinFn>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, BuiltinFn> = HashMap::new();
    m.insert("contains", contains);
    m.insert("startsWith", starts_with);
    m.insert("endsWith", ends_with);
    m.insert("format", format);
    m.insert("join", join);
    m.insert("toJSON", to_json);
    m.insert("fromJSON", from_json);
    m.insert("length", length);
    m.insert("keys", keys);
    m.insert("values", values);
    m.insert("success", success);
    m.insert("always", always);
    m.insert("failure", failure);
    m.insert("cancelled", cancelled);
    m.insert("hashFiles", hash_files);
    m
});

pub fn call(name: &str, args: &[Value], resolver: &dyn VariableResolver) -> Result<Value, Error> {
    match REGISTRY.get(name) {
        Some(f) => f(args, resolver),
        None => Err(Error::Name { name: name.to_string() }),
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn contains(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    let haystack = arg(args, 0);
    let needle = arg(args, 1);
    let found = match &haystack {
        Value::String(s) => s.contains(&needle.to_text()),
        Value::List(items) => items.iter().any(|v| v.loose_eq(&needle)),
        Value::Map(m) => m.contains_key(&needle.to_text()),
        _ => false,
    };
    Ok(Value::Bool(found))
}

fn starts_with(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    Ok(Value::Bool(arg(args, 0).to_text().starts_with(&arg(args, 1).to_text())))
}

fn ends_with(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    Ok(Value::Bool(arg(args, 0).to_text().ends_with(&arg(args, 1).to_text())))
}

fn format(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    let template = arg(args, 0).to_text();
    let mut out = String::with_capacity(template.len());
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' {
            if let Some(end) = chars[i..].iter().position(|&c| c == '}') {
                let digits: String = chars[i + 1..i + end].iter().collect();
                if let Ok(n) = digits.parse::<usize>() {
                    out.push_str(&arg(args, n + 1).to_text());
                    i += end + 1;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    Ok(Value::String(out))
}

fn join(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    let list = arg(args, 0);
    let sep = if args.len() > 1 { arg(args, 1).to_text() } else { ",".to_string() };
    match list {
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(Value::to_text).collect();
            Ok(Value::String(parts.join(&sep)))
        }
        other => Err(Error::type_error(format!("join() expects a list, got {other:?}"))),
    }
}

fn to_json(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    let json: serde_json::Value = arg(args, 0).into();
    Ok(Value::String(serde_json::to_string(&json)?))
}

fn from_json(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    let text = arg(args, 0).to_text();
    let json: serde_json::Value = serde_json::from_str(&text)?;
    Ok(Value::from(json))
}

fn length(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    let value = arg(args, 0);
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::List(l) => l.len(),
        Value::Map(m) => m.len(),
        _ => return Err(Error::type_error("length() expects a string, list, or map")),
    };
    Ok(Value::Number(len as f64))
}

fn keys(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    match arg(args, 0) {
        Value::Map(m) => Ok(Value::List(m.keys().map(|k| Value::String(k.clone())).collect())),
        other => Err(Error::type_error(format!("keys() expects a map, got {other:?}"))),
    }
}

fn values(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    match arg(args, 0) {
        Value::Map(m) => Ok(Value::List(m.values().cloned().collect())),
        other => Err(Error::type_error(format!("values() expects a map, got {other:?}"))),
    }
}

fn success(_args: &[Value], resolver: &dyn VariableResolver) -> Result<Value, Error> {
    Ok(Value::Bool(!resolver.any_step_failed()))
}

fn always(_args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    Ok(Value::Bool(true))
}

fn failure(_args: &[Value], resolver: &dyn VariableResolver) -> Result<Value, Error> {
    Ok(Value::Bool(resolver.any_step_failed()))
}

fn cancelled(_args: &[Value], resolver: &dyn VariableResolver) -> Result<Value, Error> {
    Ok(Value::Bool(resolver.is_cancelled()))
}

fn hash_files(args: &[Value], _resolver: &dyn VariableResolver) -> Result<Value, Error> {
    let mut hasher = DefaultHasher::new();
    for a in args {
        a.to_text().hash(&mut hasher);
    }
    Ok(Value::String(format!("{:016x}", hasher.finish())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::TestResolver;

    #[test]
    fn test_contains_string() {
        let resolver = TestResolver::with_inputs(&[]);
        let result = call("contains", &[Value::String("hello world".into()), Value::String("world".into())], &resolver)
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn test_format_positional() {
        let resolver = TestResolver::with_inputs(&[]);
        let result = call(
            "format",
            &[Value::String("{0} and {1}".into()), Value::String("a".into()), Value::String("b".into())],
            &resolver,
        )
        .unwrap();
        assert_eq!(result, Value::String("a and b".to_string()));
    }

    #[test]
    fn test_join() {
        let resolver = TestResolver::with_inputs(&[]);
        let list = Value::List(vec![Value::Number(1.0), Value::Number(2.0)]);
        let result = call("join", &[list, Value::String("-".into())], &resolver).unwrap();
        assert_eq!(result, Value::String("1-2".to_string()));
    }

    #[test]
    fn test_to_json_from_json_round_trip() {
        let resolver = TestResolver::with_inputs(&[]);
        let value = Value::Map(
            [("x".to_string(), Value::Number(1.0))].into_iter().collect(),
        );
        let json = call("toJSON", &[value.clone()], &resolver).unwrap();
        let back = call("fromJSON", &[json], &resolver).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_unknown_function() {
        let resolver = TestResolver::with_inputs(&[]);
        assert!(matches!(call("nope", &[], &resolver), Err(Error::Name { .. })));
    }
}
