// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template Engine (C3): locates `${{ … }}` sites in a string, hands the
//! contained expression to C2, and splices the result back in.

use crate::error::Error;
use crate::resolver::VariableResolver;
use crate::value::Value;

/// Renders every `${{ … }}` occurrence in `source`.
///
/// A single match spanning the entire input returns the evaluator's native
/// `Value` (so a template like `"${{ inputs.count }}"` preserves a number
/// or list rather than stringifying it). Anything else — multiple matches,
/// a match embedded in surrounding text, or a `$${{` escape — is rendered
/// as a `String`, scanned in one left-to-right pass so an escaped sequence
/// is spliced into the output literally and never re-examined as a real
/// template site.
pub fn render(source: &str, resolver: &dyn VariableResolver) -> Result<Value, Error> {
    let source = strip_trailing_comment(source);

    if let Some(whole) = as_single_full_match(source) {
        return crate::expr::evaluate(whole, resolver);
    }

    let mut rendered = String::with_capacity(source.len());
    let mut i = 0;
    while i < source.len() {
        if source[i..].starts_with("$${{") {
            rendered.push_str("${{");
            i += "$${{".len();
            continue;
        }
        if let Some(rest) = source[i..].strip_prefix("${{") {
            if let Some(rel_end) = rest.find("}}") {
                let expr_src = rest[..rel_end].trim();
                let value = crate::expr::evaluate(expr_src, resolver)?;
                rendered.push_str(&value.to_text());
                i += "${{".len() + rel_end + "}}".len();
                continue;
            }
        }
        let ch = source[i..].chars().next().expect("i < source.len() implies a char remains");
        rendered.push(ch);
        i += ch.len_utf8();
    }

    Ok(Value::String(rendered))
}

/// Convenience for callers that only ever want a string back (e.g. a
/// shell command template); coerces a native non-string result with
/// `to_text()`.
pub fn render_to_string(source: &str, resolver: &dyn VariableResolver) -> Result<String, Error> {
    Ok(render(source, resolver)?.to_text())
}

/// A leading `//`-prefixed trailing comment is stripped before evaluation,
/// as long as it appears outside of any `${{ }}` expression.
fn strip_trailing_comment(source: &str) -> &str {
    let mut depth = 0i32;
    let mut skip_until = 0;
    for (i, _) in source.char_indices() {
        if i < skip_until {
            continue;
        }
        if source[i..].starts_with("${{") {
            depth += 1;
            skip_until = i + 3;
            continue;
        }
        if depth > 0 && source[i..].starts_with("}}") {
            depth -= 1;
            skip_until = i + 2;
            continue;
        }
        if depth == 0 && source[i..].starts_with("//") {
            return source[..i].trim_end();
        }
    }
    source
}

/// If `source`, after trimming whitespace, is exactly one `${{ … }}`
/// template with nothing before or after it, returns the inner expression
/// source.
fn as_single_full_match(source: &str) -> Option<&str> {
    let trimmed = source.trim();
    let inner = trimmed.strip_prefix("${{")?.strip_suffix("}}")?;
    if inner.contains("${{") {
        return None;
    }
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::TestResolver;

    #[test]
    fn test_single_full_match_preserves_type() {
        let resolver = TestResolver::with_inputs(&[("count", Value::Number(3.0))]);
        let result = render("${{ inputs.count }}", &resolver).unwrap();
        assert_eq!(result, Value::Number(3.0));
    }

    #[test]
    fn test_embedded_match_is_stringified() {
        let resolver = TestResolver::with_inputs(&[("count", Value::Number(3.0))]);
        let result = render("count is ${{ inputs.count }} today", &resolver).unwrap();
        assert_eq!(result, Value::String("count is 3 today".to_string()));
    }

    #[test]
    fn test_multiple_matches() {
        let resolver = TestResolver::with_inputs(&[("a", Value::Number(1.0)), ("b", Value::Number(2.0))]);
        let result = render("${{ inputs.a }}-${{ inputs.b }}", &resolver).unwrap();
        assert_eq!(result, Value::String("1-2".to_string()));
    }

    #[test]
    fn test_escape_sequence_is_literal() {
        let resolver = TestResolver::with_inputs(&[]);
        let result = render("literal $${{ not evaluated }}", &resolver).unwrap();
        assert_eq!(result, Value::String("literal ${{ not evaluated }}".to_string()));
    }

    #[test]
    fn test_trailing_comment_is_stripped() {
        let resolver = TestResolver::with_inputs(&[("x", Value::Number(5.0))]);
        let result = render("${{ inputs.x }} // this is a comment", &resolver).unwrap();
        assert_eq!(result, Value::Number(5.0));
    }

    #[test]
    fn test_failure_propagates() {
        let resolver = TestResolver::with_inputs(&[]);
        let result = render("${{ inputs.missing }}", &resolver);
        assert!(result.is_err());
    }

    #[test]
    fn test_plain_string_passes_through() {
        let resolver = TestResolver::with_inputs(&[]);
        let result = render("no templates here", &resolver).unwrap();
        assert_eq!(result, Value::String("no templates here".to_string()));
    }
}
