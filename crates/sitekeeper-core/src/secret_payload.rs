//! Deployment secret payload → env file.
//!
//! The secret store hands over one JSON object, possibly wrapped as
//! `{"SecretString": "<json>"}`. Database keys arrive under several naming
//! schemes; the first non-empty alias wins.

use crate::env_file;
use crate::error::{ProvisionError, Result};
use serde_json::{Map, Value};

/// `(canonical key, aliases in priority order)`.
const ALIASES: &[(&str, &[&str])] = &[
    ("DB_HOST", &["DATABASE_ENDPOINT", "RDS_HOSTNAME", "DB_HOST"]),
    ("DB_NAME", &["DATABASE_NAME", "RDS_DB_NAME", "DB_NAME"]),
    ("DB_USER", &["DATABASE_USERNAME", "RDS_USERNAME", "DB_USER"]),
    ("DB_PASSWORD", &["DATABASE_PASSWORD", "RDS_PASSWORD", "DB_PASSWORD"]),
    ("ADMIN_PASSWORD", &["ADMIN_PASSWORD", "FRA_ADMIN_PASSWORD"]),
    ("DB_PORT", &["DATABASE_PORT", "RDS_PORT", "DB_PORT"]),
];

const PASS_THROUGH: &[&str] = &[
    "SITE_URL",
    "BUCKET_NAME",
    "BUCKET_ENDPOINT",
    "BUCKET_REGION",
    "BUCKET_ACCESS_KEY_ID",
    "BUCKET_SECRET_ACCESS_KEY",
    "FILES_BACK_UP_HOURS",
    "EXISTING_SITE",
    "ALLOW_NON_EMPTY_SCHEMA",
];

const DEFAULT_DB_PORT: &str = "3306";

pub fn parse(raw: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ProvisionError::SecretPayload(format!("not valid JSON: {e}")))?;
    let Value::Object(mut object) = value else {
        return Err(ProvisionError::SecretPayload("expected a JSON object".into()));
    };
    if let Some(wrapped) = object.remove("SecretString") {
        let inner = match wrapped {
            Value::String(s) => serde_json::from_str::<Value>(&s).map_err(|e| {
                ProvisionError::SecretPayload(format!("SecretString is not valid JSON: {e}"))
            })?,
            other => other,
        };
        return match inner {
            Value::Object(map) => Ok(map),
            _ => Err(ProvisionError::SecretPayload(
                "SecretString does not hold a JSON object".into(),
            )),
        };
    }
    Ok(object)
}

fn text(secret: &Map<String, Value>, key: &str) -> Option<String> {
    match secret.get(key)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn first_of(secret: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| text(secret, k))
}

/// Canonical `(key, value)` pairs in env-file order.
pub fn env_pairs(secret: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (canonical, aliases) in ALIASES {
        if let Some(value) = first_of(secret, aliases) {
            pairs.push((canonical.to_string(), value));
        } else if *canonical == "DB_PORT" && pairs.iter().any(|(k, _)| k == "DB_HOST") {
            pairs.push(("DB_PORT".to_string(), DEFAULT_DB_PORT.to_string()));
        }
    }

    let site_name = text(secret, "SITE_NAME").or_else(|| {
        first_of(secret, &["LIGHTSAIL_IP", "lightsail_host"]).map(|h| h.replace('.', "_"))
    });
    if let Some(site) = site_name {
        pairs.push(("SITE_NAME".to_string(), site));
    }

    for key in PASS_THROUGH {
        if let Some(value) = text(secret, key) {
            pairs.push((key.to_string(), value));
        }
    }
    pairs
}

/// Env-file content for a payload. A verbatim `env_file_content` wins over
/// anything derived from individual keys.
pub fn render_env(raw: &str) -> Result<String> {
    let secret = parse(raw)?;
    if let Some(content) = text(&secret, "env_file_content") {
        env_file::parse(&content)?;
        return Ok(if content.ends_with('\n') {
            content
        } else {
            format!("{content}\n")
        });
    }
    let pairs = env_pairs(&secret);
    if pairs.is_empty() {
        return Err(ProvisionError::SecretPayload(
            "payload holds no recognized configuration keys".into(),
        ));
    }
    Ok(env_file::render(
        pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_rds_aliases_and_defaults_port() {
        let env = render_env(
            r#"{"RDS_HOSTNAME": "tenant.cluster.rds.amazonaws.com", "RDS_DB_NAME": "tenant_db",
                "RDS_USERNAME": "dbadmin", "RDS_PASSWORD": "Qx9", "FRA_ADMIN_PASSWORD": "Adm1n",
                "SITE_NAME": "hr.example.com"}"#,
        )
        .unwrap();
        let map = env_file::parse(&env).unwrap();
        assert_eq!(map["DB_HOST"], "tenant.cluster.rds.amazonaws.com");
        assert_eq!(map["DB_NAME"], "tenant_db");
        assert_eq!(map["DB_USER"], "dbadmin");
        assert_eq!(map["ADMIN_PASSWORD"], "Adm1n");
        assert_eq!(map["DB_PORT"], "3306");
        assert_eq!(map["SITE_NAME"], "hr.example.com");
    }

    #[test]
    fn database_endpoint_beats_db_host() {
        let secret = parse(r#"{"DATABASE_ENDPOINT": "a", "DB_HOST": "b", "DATABASE_PORT": 3307}"#)
            .unwrap();
        let pairs = env_pairs(&secret);
        assert!(pairs.contains(&("DB_HOST".to_string(), "a".to_string())));
        assert!(pairs.contains(&("DB_PORT".to_string(), "3307".to_string())));
    }

    #[test]
    fn unwraps_secret_string() {
        let raw = r#"{"SecretString": "{\"SITE_URL\": \"https://hr.example.com\", \"BUCKET_NAME\": \"files\"}"}"#;
        let map = env_file::parse(&render_env(raw).unwrap()).unwrap();
        assert_eq!(map["SITE_URL"], "https://hr.example.com");
        assert_eq!(map["BUCKET_NAME"], "files");
        assert!(!map.contains_key("DB_PORT"));
    }

    #[test]
    fn site_name_falls_back_to_ip() {
        let secret = parse(r#"{"LIGHTSAIL_IP": "3.14.15.92", "EXISTING_SITE": true}"#).unwrap();
        let pairs = env_pairs(&secret);
        assert!(pairs.contains(&("SITE_NAME".to_string(), "3_14_15_92".to_string())));
        assert!(pairs.contains(&("EXISTING_SITE".to_string(), "true".to_string())));
    }

    #[test]
    fn verbatim_env_file_content_wins() {
        let raw = r#"{"env_file_content": "SITE_NAME=hr.example.com\nDB_HOST=db", "DB_HOST": "ignored"}"#;
        assert_eq!(render_env(raw).unwrap(), "SITE_NAME=hr.example.com\nDB_HOST=db\n");
    }

    #[test]
    fn rejects_non_objects_and_empty_payloads() {
        assert!(matches!(render_env("[1, 2]"), Err(ProvisionError::SecretPayload(_))));
        assert!(matches!(render_env("{\"unrelated\": 1}"), Err(ProvisionError::SecretPayload(_))));
        assert!(matches!(render_env("not json"), Err(ProvisionError::SecretPayload(_))));
    }
}
