//! Parameter files and precedence resolution.
//!
//! Effective parameters come from four layers, strongest first:
//! CLI `--param` > environment (`<prefix><KEY>`) > config file > step
//! defaults. Each key records where its value came from.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use caps_core::manifest::ParamSource;
use caps_core::param::{ParamMap, ParamValue};

use crate::CliError;

/// Parse repeated `KEY=VALUE` arguments into a map.
pub fn parse_keyval_list(items: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    let mut out = BTreeMap::new();
    for item in items {
        let (k, v) = item
            .split_once('=')
            .ok_or_else(|| CliError::new(format!("expected KEY=VALUE, got {item:?}")))?;
        out.insert(k.to_string(), v.to_string());
    }
    Ok(out)
}

/// Load a flat parameter table from a TOML or JSON file.
pub fn load_config(path: Option<&Path>) -> Result<ParamMap, CliError> {
    let Some(path) = path else {
        return Ok(ParamMap::new());
    };
    if !path.exists() {
        return Err(CliError::new(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    let text = fs::read_to_string(path)
        .map_err(|e| CliError::new(format!("reading {}: {e}", path.display())))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") | Some("tml") => parse_toml_params(&text)
            .map_err(|e| CliError::new(format!("{}: {e}", path.display()))),
        Some("json") => parse_json_params(&text)
            .map_err(|e| CliError::new(format!("{}: {e}", path.display()))),
        _ => Err(CliError::new(
            "unsupported config format (use TOML or JSON)".to_string(),
        )),
    }
}

fn parse_toml_params(text: &str) -> Result<ParamMap, String> {
    let value: toml::Value = toml::from_str(text).map_err(|e| e.to_string())?;
    let table = value
        .as_table()
        .ok_or_else(|| "config root must be a table".to_string())?;
    let mut out = ParamMap::new();
    for (key, v) in table {
        let param = match v {
            toml::Value::String(s) => ParamValue::Str(s.clone()),
            toml::Value::Integer(i) => ParamValue::Int(*i),
            toml::Value::Float(f) => ParamValue::Float(*f),
            toml::Value::Boolean(b) => ParamValue::Bool(*b),
            other => {
                return Err(format!(
                    "parameter {key:?} must be a scalar, got {}",
                    other.type_str()
                ))
            }
        };
        out.insert(key.clone(), param);
    }
    Ok(out)
}

fn parse_json_params(text: &str) -> Result<ParamMap, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let obj = value
        .as_object()
        .ok_or_else(|| "config root must be an object".to_string())?;
    let mut out = ParamMap::new();
    for (key, v) in obj {
        let param = ParamValue::from_json(v).map_err(|e| format!("parameter {key:?}: {e}"))?;
        out.insert(key.clone(), param);
    }
    Ok(out)
}

/// Produce effective params and a provenance map per key.
///
/// Env vars are matched as `<prefix><KEY-uppercased>`; env and CLI
/// literals are interpreted like config scalars so the same logical
/// value digests identically whichever layer it came from.
pub fn merge_params(
    defaults: &ParamMap,
    config: &ParamMap,
    env_prefix: &str,
    cli: &BTreeMap<String, String>,
) -> (ParamMap, BTreeMap<String, ParamSource>) {
    let mut keys: Vec<&String> = defaults.keys().chain(config.keys()).chain(cli.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut effective = ParamMap::new();
    let mut provenance = BTreeMap::new();
    for key in keys {
        let env_key = format!("{env_prefix}{}", key.to_uppercase());
        let (value, source) = if let Some(raw) = cli.get(key) {
            (ParamValue::parse_cli(raw), ParamSource::Cli)
        } else if let Ok(raw) = env::var(&env_key) {
            (ParamValue::parse_cli(&raw), ParamSource::Env)
        } else if let Some(v) = config.get(key) {
            (v.clone(), ParamSource::Config)
        } else {
            (
                defaults.get(key).cloned().unwrap_or(ParamValue::Null),
                ParamSource::Default,
            )
        };
        effective.insert(key.clone(), value);
        provenance.insert(key.clone(), source);
    }
    (effective, provenance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyval_parsing_requires_equals() {
        let ok = parse_keyval_list(&["a=1".into(), "b=x=y".into()]).unwrap();
        assert_eq!(ok["a"], "1");
        assert_eq!(ok["b"], "x=y");
        assert!(parse_keyval_list(&["nope".into()]).is_err());
    }

    #[test]
    fn toml_scalars_keep_their_types() {
        let params = parse_toml_params("suffix = \"!\"\ncount = 3\nratio = 0.5\non = true").unwrap();
        assert_eq!(params["suffix"], ParamValue::Str("!".into()));
        assert_eq!(params["count"], ParamValue::Int(3));
        assert_eq!(params["ratio"], ParamValue::Float(0.5));
        assert_eq!(params["on"], ParamValue::Bool(true));
    }

    #[test]
    fn compound_config_values_are_rejected() {
        assert!(parse_toml_params("items = [1, 2]").is_err());
        assert!(parse_json_params(r#"{"m": {"k": 1}}"#).is_err());
    }

    #[test]
    fn cli_beats_config_beats_defaults() {
        let mut defaults = ParamMap::new();
        defaults.insert("suffix".into(), ParamValue::Str("!!!".into()));
        defaults.insert("count".into(), ParamValue::Int(1));

        let mut config = ParamMap::new();
        config.insert("suffix".into(), ParamValue::Str("?".into()));

        let cli = parse_keyval_list(&["count=5".into()]).unwrap();

        let (eff, prov) = merge_params(&defaults, &config, "CAPS_TEST_NOPE_", &cli);
        assert_eq!(eff["suffix"], ParamValue::Str("?".into()));
        assert_eq!(prov["suffix"], ParamSource::Config);
        assert_eq!(eff["count"], ParamValue::Int(5));
        assert_eq!(prov["count"], ParamSource::Cli);
    }

    #[test]
    fn unknown_keys_default_to_null() {
        let defaults = ParamMap::new();
        let config = ParamMap::new();
        let cli = BTreeMap::new();
        let (eff, _) = merge_params(&defaults, &config, "X_", &cli);
        assert!(eff.is_empty());
    }
}
