//! Input file loading for CLI subcommands.
//!
//! Every loader returns a ready-to-print `error: ...` message on failure.

use std::path::Path;

use tollgate_eval::{ComparisonAssertion, EngineConfig, VariableMap};
use tracing::debug;

fn read(path: &Path, what: &str) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map_err(|_| format!("error: {} file not found: {}", what, path.display()))
}

fn read_json(path: &Path, what: &str) -> Result<serde_json::Value, String> {
    let content = read(path, what)?;
    serde_json::from_str(&content)
        .map_err(|e| format!("error: invalid JSON in {}: {}", path.display(), e))
}

/// Engine settings from a TOML file, or defaults when no file is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let content = read(path, "config")?;
    let config: EngineConfig = toml::from_str(&content)
        .map_err(|e| format!("error: could not parse '{}': {}", path.display(), e))?;
    debug!(path = %path.display(), strict = config.strict, "loaded engine config");
    Ok(config)
}

/// A variable map from a JSON object file. No file means no variables.
pub(crate) fn load_vars(path: Option<&Path>) -> Result<VariableMap, String> {
    let Some(path) = path else {
        return Ok(VariableMap::new());
    };
    let json = read_json(path, "vars")?;
    let vars = VariableMap::from_json(&json)
        .map_err(|e| format!("error: invalid variables in {}: {}", path.display(), e))?;
    debug!(path = %path.display(), count = vars.len(), "loaded variables");
    Ok(vars)
}

pub(crate) fn load_assertion(path: &Path) -> Result<ComparisonAssertion, String> {
    let json = read_json(path, "assertion")?;
    serde_json::from_value(json)
        .map_err(|e| format!("error: invalid assertion in {}: {}", path.display(), e))
}
