//! JSON configuration files under the bench `sites/` directory.
//!
//! Both `common_site_config.json` (shared) and `<site>/site_config.json` are
//! flat JSON objects. Writes merge into whatever is already there and only
//! touch the file when a value actually changes.

use crate::error::Result;
use crate::io;
use serde_json::{Map, Value};
use std::path::Path;

pub type ConfigMap = Map<String, Value>;

/// Read a config file. Missing file → `Ok(None)`; malformed JSON → `Err`.
pub fn read(path: &Path) -> Result<Option<ConfigMap>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(Some(ConfigMap::new()));
    }
    let map: ConfigMap = serde_json::from_str(&data)?;
    Ok(Some(map))
}

pub fn get(path: &Path, key: &str) -> Result<Option<Value>> {
    Ok(read(path)?.and_then(|mut m| m.remove(key)))
}

/// Merge `updates` into the file, creating it if needed.
/// Returns the keys whose value changed; an empty result means no write happened.
pub fn merge(path: &Path, updates: &[(&str, Value)]) -> Result<Vec<String>> {
    let mut map = read(path)?.unwrap_or_default();
    let mut changed = Vec::new();
    for (key, value) in updates {
        if map.get(*key) != Some(value) {
            map.insert((*key).to_string(), value.clone());
            changed.push((*key).to_string());
        }
    }
    if !changed.is_empty() || !path.exists() {
        let data = serde_json::to_string_pretty(&map)?;
        io::atomic_write(path, format!("{data}\n").as_bytes())?;
    }
    Ok(changed)
}

/// Loose equality used by set-if-different checks: `1` and `"1"` are the same
/// value as far as the bench's `set-config` is concerned.
pub fn same_value(current: Option<&Value>, desired: &Value) -> bool {
    match current {
        None => false,
        Some(v) if v == desired => true,
        Some(Value::String(s)) => desired.to_string() == *s,
        Some(v) => match desired {
            Value::String(s) => v.to_string() == *s,
            _ => false,
        },
    }
}
