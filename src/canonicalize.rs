//! Deterministic JSON canonicalization for signature generation.
//!
//! Signed envelopes (passport bindings, standing intents, delegation tokens)
//! are hashed over a canonical rendering of their JSON form: object keys
//! sorted by UTF-16 code units, no whitespace, minimal string escaping.
//! Envelopes carry only strings, booleans, and integers; floats are rejected
//! so two implementations can never disagree on a rendering.
//!
//! # Example
//!
//! ```rust
//! use agentpass::canonicalize;
//! use serde_json::json;
//!
//! let value = json!({"b": 2, "a": 1});
//! let canonical = canonicalize(&value).unwrap();
//! assert_eq!(canonical, r#"{"a":1,"b":2}"#);
//! ```

use serde_json::Value;

use crate::error::Error;

/// Canonicalize a JSON value to a deterministic string.
///
/// # Errors
///
/// Returns an error if the value contains a non-integer number.
pub fn canonicalize(value: &Value) -> Result<String, Error> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str(&i.to_string());
            } else if let Some(u) = n.as_u64() {
                out.push_str(&u.to_string());
            } else {
                return Err(Error::Canonicalization(format!(
                    "non-integer number {n} has no canonical form; encode it as a string"
                )));
            }
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(obj) => {
            // Sort keys by UTF-16 code units, not bytes: supplementary-plane
            // characters order differently under the two encodings.
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort_by(|a, b| {
                a.encode_utf16()
                    .collect::<Vec<u16>>()
                    .cmp(&b.encode_utf16().collect::<Vec<u16>>())
            });

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &obj[*key])?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Quote a string with minimal escaping: only control characters, backslash,
/// and double quote.
fn write_string(out: &mut String, s: &str) {
    use std::fmt::Write;

    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{0009}' => out.push_str("\\t"),
            '\u{000A}' => out.push_str("\\n"),
            '\u{000C}' => out.push_str("\\f"),
            '\u{000D}' => out.push_str("\\r"),
            c if c < '\u{0020}' => {
                write!(out, "\\u{:04x}", c as u32).ok();
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(canonicalize(&json!(null)).unwrap(), "null");
        assert_eq!(canonicalize(&json!(true)).unwrap(), "true");
        assert_eq!(canonicalize(&json!(42)).unwrap(), "42");
        assert_eq!(canonicalize(&json!(-7)).unwrap(), "-7");
        assert_eq!(canonicalize(&json!("hi")).unwrap(), "\"hi\"");
    }

    #[test]
    fn test_object_keys_sorted() {
        let value = json!({"walletAddress": "0xabc", "did": "did:agentpass:lab/scout-1"});
        assert_eq!(
            canonicalize(&value).unwrap(),
            r#"{"did":"did:agentpass:lab/scout-1","walletAddress":"0xabc"}"#
        );
    }

    #[test]
    fn test_nested_and_no_whitespace() {
        let value = json!({"a": {"c": [1, 2], "b": "x"}});
        assert_eq!(canonicalize(&value).unwrap(), r#"{"a":{"b":"x","c":[1,2]}}"#);
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(canonicalize(&json!("a\nb")).unwrap(), "\"a\\nb\"");
        assert_eq!(canonicalize(&json!("q\"q")).unwrap(), "\"q\\\"q\"");
        assert_eq!(canonicalize(&json!("\u{0001}")).unwrap(), "\"\\u0001\"");
    }

    #[test]
    fn test_floats_rejected() {
        let result = canonicalize(&json!(0.25));
        assert!(matches!(result, Err(Error::Canonicalization(_))));
    }

    #[test]
    fn test_utf16_key_order() {
        // U+FF21 (fullwidth A) sorts after U+0061 ('a') in both encodings, but
        // U+1D400 (mathematical A, surrogate pair 0xD835 0xDC00) must sort
        // between them under UTF-16 rules.
        let value = json!({"\u{1D400}": 1, "a": 2, "\u{FF21}": 3});
        let canonical = canonicalize(&value).unwrap();
        let a = canonical.find("\"a\"").unwrap();
        let math_a = canonical.find('\u{1D400}').unwrap();
        let fullwidth_a = canonical.find('\u{FF21}').unwrap();
        assert!(a < math_a && math_a < fullwidth_a);
    }
}
