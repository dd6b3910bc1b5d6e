//! `KEY=VALUE` env files, the format the deployment hands to the reconciler.
//!
//! Accepted syntax: blank lines, `#` comments, an optional `export ` prefix,
//! and values wrapped in matching single or double quotes.

use crate::error::{ProvisionError, Result};
use std::collections::BTreeMap;
use std::path::Path;

pub type EnvMap = BTreeMap<String, String>;

pub fn parse(content: &str) -> Result<EnvMap> {
    let mut map = EnvMap::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(ProvisionError::Config(format!(
                "env file line {}: expected KEY=VALUE, got '{raw}'",
                idx + 1
            )));
        };
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ProvisionError::Config(format!(
                "env file line {}: invalid key '{key}'",
                idx + 1
            )));
        }
        map.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    Ok(map)
}

pub fn load(path: &Path) -> Result<EnvMap> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// Render pairs in the given order, one per line, with a trailing newline.
pub fn render<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_quotes_and_export() {
        let content = "# deployment\nDB_HOST=db.internal\nexport DB_PORT=3306\n\nSITE_URL=\"https://hr.example.com\"\nADMIN_PASSWORD='s3cr=t'\n";
        let map = parse(content).unwrap();
        assert_eq!(map["DB_HOST"], "db.internal");
        assert_eq!(map["DB_PORT"], "3306");
        assert_eq!(map["SITE_URL"], "https://hr.example.com");
        assert_eq!(map["ADMIN_PASSWORD"], "s3cr=t");
    }

    #[test]
    fn empty_value_is_kept() {
        let map = parse("BUCKET_NAME=\n").unwrap();
        assert_eq!(map["BUCKET_NAME"], "");
    }

    #[test]
    fn rejects_line_without_equals() {
        let err = parse("DB_HOST\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn render_keeps_order() {
        let out = render([("SITE_NAME", "hr"), ("DB_PORT", "3306")]);
        assert_eq!(out, "SITE_NAME=hr\nDB_PORT=3306\n");
    }
}
