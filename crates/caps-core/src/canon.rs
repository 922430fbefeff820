//! Canonical JSON: the byte form that digests are computed over.
//!
//! This is a wire contract, implemented directly rather than through an
//! off-the-shelf serializer: keys sorted lexicographically at every
//! level, no whitespace, UTF-8 with non-ASCII characters passed through
//! unescaped, control characters escaped. Array order is preserved.
//!
//! The value space is JSON minus non-finite floats; `serde_json::Value`
//! cannot represent NaN or infinities, so the writer is total.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Canonical JSON bytes of a JSON value.
pub fn to_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_value(&mut out, value);
    out.into_bytes()
}

/// Canonical JSON as a string (handy in tests and digests of text).
pub fn to_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonicalize any serializable value by converting through `Value`.
pub fn to_bytes_of<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let v = serde_json::to_value(value)?;
    Ok(to_bytes(&v))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        // serde_json's Display for Number is already the canonical JSON
        // token (decimal integers, shortest round-trip floats).
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key.as_str()]);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            // Non-ASCII passes through as UTF-8.
            c => out.push(c),
        }
    }
    out.push('"');
}
