//! Parameter scalars.
//!
//! Parameters flow in from the CLI, environment variables, config files,
//! and step defaults; the type of a value must survive that trip so the
//! params digest is stable across front-ends. `ParamValue` is a tagged
//! scalar in memory but serializes as the bare JSON scalar, so canonical
//! JSON sees `{"n":3}` rather than `{"n":{"Int":3}}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// Effective parameter mapping, keyed by parameter name.
pub type ParamMap = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Interpret a CLI or environment literal.
    ///
    /// `null`, `true`, `false`, integer, and float literals become typed
    /// values; anything else is a string. `--param n=3` therefore hashes
    /// identically to a config file's `n = 3`.
    pub fn parse_cli(s: &str) -> Self {
        match s {
            "null" => return ParamValue::Null,
            "true" => return ParamValue::Bool(true),
            "false" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = s.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return ParamValue::Float(f);
            }
        }
        ParamValue::Str(s.to_string())
    }

    /// Convert from a JSON scalar. Arrays and objects are rejected.
    pub fn from_json(v: &Value) -> Result<Self> {
        match v {
            Value::Null => Ok(ParamValue::Null),
            Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ParamValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(ParamValue::Float(f))
                } else {
                    Err(Error::Config(format!("unrepresentable number {n}")))
                }
            }
            Value::String(s) => Ok(ParamValue::Str(s.clone())),
            other => Err(Error::Config(format!(
                "parameter values must be scalars, got {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Null => Value::Null,
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Int(i) => Value::from(*i),
            ParamValue::Float(f) => {
                // Finite by construction; from_f64 only fails on NaN/Inf.
                serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
            }
            ParamValue::Str(s) => Value::String(s.clone()),
        }
    }

    /// String accessor, for steps that expect text parameters.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "null"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{}", self::float_token(*x)),
            ParamValue::Str(s) => write!(f, "{s}"),
        }
    }
}

fn float_token(f: f64) -> String {
    // Same shortest round-trip form that lands in canonical JSON.
    serde_json::Number::from_f64(f)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "null".to_string())
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ParamValue::Null => serializer.serialize_unit(),
            ParamValue::Bool(b) => serializer.serialize_bool(*b),
            ParamValue::Int(i) => serializer.serialize_i64(*i),
            ParamValue::Float(f) => serializer.serialize_f64(*f),
            ParamValue::Str(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        ParamValue::from_json(&v).map_err(D::Error::custom)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon;

    #[test]
    fn cli_literals_are_typed() {
        assert_eq!(ParamValue::parse_cli("null"), ParamValue::Null);
        assert_eq!(ParamValue::parse_cli("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse_cli("42"), ParamValue::Int(42));
        assert_eq!(ParamValue::parse_cli("-7"), ParamValue::Int(-7));
        assert_eq!(ParamValue::parse_cli("2.5"), ParamValue::Float(2.5));
        assert_eq!(ParamValue::parse_cli("!"), ParamValue::Str("!".into()));
        assert_eq!(ParamValue::parse_cli("nan"), ParamValue::Str("nan".into()));
    }

    #[test]
    fn serializes_as_bare_scalars() {
        let mut m = ParamMap::new();
        m.insert("b".into(), ParamValue::Bool(true));
        m.insert("n".into(), ParamValue::Int(3));
        m.insert("s".into(), ParamValue::Str("x".into()));
        m.insert("z".into(), ParamValue::Null);
        let bytes = canon::to_bytes_of(&m).unwrap();
        assert_eq!(bytes, br#"{"b":true,"n":3,"s":"x","z":null}"#);
    }

    #[test]
    fn front_ends_agree_on_digests() {
        // Config-file 3 and CLI "3" must canonicalize identically.
        let from_config = ParamValue::from_json(&serde_json::json!(3)).unwrap();
        let from_cli = ParamValue::parse_cli("3");
        assert_eq!(
            canon::to_bytes_of(&from_config).unwrap(),
            canon::to_bytes_of(&from_cli).unwrap()
        );
    }

    #[test]
    fn rejects_compound_values() {
        assert!(ParamValue::from_json(&serde_json::json!([1, 2])).is_err());
        assert!(ParamValue::from_json(&serde_json::json!({"a": 1})).is_err());
    }
}
