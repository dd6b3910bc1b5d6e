use crate::decision::Policy;
use crate::env_file::EnvMap;
use crate::error::{ProvisionError, Result};
use crate::target::{
    DatabaseConnection, DatabaseKind, ObjectStorage, ProvisioningTarget, Secret, Transports,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Port the application's web worker listens on inside the deployment.
/// Links built from a host name carrying it are unreachable from outside.
pub const APP_LISTENER_PORT: u16 = 8000;

/// `DB_HOST` values that mean "the database next to the bench".
const EMBEDDED_HOSTS: &[&str] = &["", "local", "localhost", "127.0.0.1", "db", "mariadb"];

/// Every key the configuration surface reads. Process environment variables
/// with these names override the env file.
pub const CONFIG_KEYS: &[&str] = &[
    "SITE_NAME",
    "SITE_URL",
    "BENCH_DIR",
    "APPS",
    "FRAPPE_BRANCH",
    "DB_HOST",
    "DB_PORT",
    "DB_NAME",
    "DB_USER",
    "DB_PASSWORD",
    "ADMIN_PASSWORD",
    "REDIS_CACHE",
    "REDIS_QUEUE",
    "REDIS_SOCKETIO",
    "BUCKET_NAME",
    "BUCKET_ENDPOINT",
    "BUCKET_REGION",
    "BUCKET_ACCESS_KEY_ID",
    "BUCKET_SECRET_ACCESS_KEY",
    "FILES_BACK_UP_HOURS",
    "EXISTING_SITE",
    "ALLOW_NON_EMPTY_SCHEMA",
    "DB_CONNECT_TIMEOUT_SECS",
    "BENCH_BIN",
    "MYSQL_BIN",
];

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_bench_dir() -> PathBuf {
    PathBuf::from("/home/frappe/frappe-bench")
}

fn default_apps() -> Vec<String> {
    vec!["erpnext".to_string(), "hrms".to_string()]
}

fn default_db_port() -> u16 {
    3306
}

fn default_backup_hours() -> u32 {
    6
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_redis_cache() -> String {
    "redis://redis-cache:6379".to_string()
}

fn default_redis_queue() -> String {
    "redis://redis-queue:6379".to_string()
}

// ---------------------------------------------------------------------------
// ProvisionConfig
// ---------------------------------------------------------------------------

/// Raw, typed view of the environment-style configuration surface.
///
/// Parsing only checks syntax (numbers, booleans). Semantic checks live in
/// [`ProvisionConfig::validate`] and run before any state is probed.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub site_name: Option<String>,
    pub site_url: Option<String>,
    pub bench_dir: PathBuf,
    pub apps: Vec<String>,
    pub framework_branch: Option<String>,
    pub db_host: Option<String>,
    pub db_port: u16,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub admin_password: Option<String>,
    pub redis_cache: String,
    pub redis_queue: String,
    pub redis_socketio: Option<String>,
    pub bucket_name: Option<String>,
    pub bucket_endpoint: Option<String>,
    pub bucket_region: Option<String>,
    pub bucket_access_key_id: Option<String>,
    pub bucket_secret_access_key: Option<String>,
    pub backup_interval_hours: u32,
    pub existing_site: bool,
    pub allow_non_empty_schema: bool,
    pub connect_timeout_secs: u64,
    pub bench_bin: String,
    pub mysql_bin: String,
}

impl ProvisionConfig {
    pub fn from_env(env: &EnvMap) -> Result<Self> {
        let get = |key: &str| {
            env.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let apps = match get("APPS") {
            Some(list) => list
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            None => default_apps(),
        };

        Ok(Self {
            site_name: get("SITE_NAME"),
            site_url: get("SITE_URL"),
            bench_dir: get("BENCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_bench_dir),
            apps,
            framework_branch: get("FRAPPE_BRANCH"),
            db_host: get("DB_HOST"),
            db_port: parse_number(env, "DB_PORT")?.unwrap_or_else(default_db_port),
            db_name: get("DB_NAME"),
            db_user: get("DB_USER"),
            db_password: get("DB_PASSWORD"),
            admin_password: get("ADMIN_PASSWORD"),
            redis_cache: get("REDIS_CACHE").unwrap_or_else(default_redis_cache),
            redis_queue: get("REDIS_QUEUE").unwrap_or_else(default_redis_queue),
            redis_socketio: get("REDIS_SOCKETIO"),
            bucket_name: get("BUCKET_NAME"),
            bucket_endpoint: get("BUCKET_ENDPOINT"),
            bucket_region: get("BUCKET_REGION"),
            bucket_access_key_id: get("BUCKET_ACCESS_KEY_ID"),
            bucket_secret_access_key: get("BUCKET_SECRET_ACCESS_KEY"),
            backup_interval_hours: parse_number(env, "FILES_BACK_UP_HOURS")?
                .unwrap_or_else(default_backup_hours),
            existing_site: parse_flag(env, "EXISTING_SITE")?,
            allow_non_empty_schema: parse_flag(env, "ALLOW_NON_EMPTY_SCHEMA")?,
            connect_timeout_secs: parse_number(env, "DB_CONNECT_TIMEOUT_SECS")?
                .unwrap_or_else(default_connect_timeout),
            bench_bin: get("BENCH_BIN").unwrap_or_else(|| "bench".to_string()),
            mysql_bin: get("MYSQL_BIN").unwrap_or_else(|| "mysql".to_string()),
        })
    }

    pub fn database_kind(&self) -> DatabaseKind {
        let host = self.db_host.as_deref().unwrap_or("").to_ascii_lowercase();
        if EMBEDDED_HOSTS.contains(&host.as_str()) {
            DatabaseKind::Embedded
        } else {
            DatabaseKind::External
        }
    }

    /// A target is local when both its database and its public URL stay on this host.
    pub fn is_local_target(&self) -> bool {
        if self.database_kind() == DatabaseKind::External {
            return false;
        }
        match self.public_url().as_deref().and_then(parse_url) {
            Some(url) => is_loopback_host(&url.host),
            None => true,
        }
    }

    pub fn public_url(&self) -> Option<String> {
        match (&self.site_url, &self.site_name) {
            (Some(url), _) => Some(url.trim_end_matches('/').to_string()),
            (None, Some(site)) => Some(format!("http://{site}")),
            (None, None) => None,
        }
    }

    fn has_any_bucket_key(&self) -> bool {
        self.bucket_name.is_some()
            || self.bucket_access_key_id.is_some()
            || self.bucket_secret_access_key.is_some()
    }

    fn object_storage(&self) -> Option<ObjectStorage> {
        match (
            &self.bucket_name,
            &self.bucket_access_key_id,
            &self.bucket_secret_access_key,
        ) {
            (Some(bucket), Some(key_id), Some(secret)) => Some(ObjectStorage {
                bucket: bucket.clone(),
                endpoint: self.bucket_endpoint.clone(),
                region: self.bucket_region.clone(),
                access_key_id: key_id.clone(),
                secret_access_key: Secret::new(secret.clone()),
            }),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Keys holding a placeholder value where a real credential is required.
    /// Local targets are exempt: their databases are disposable.
    pub fn placeholder_keys(&self) -> Vec<&'static str> {
        if self.is_local_target() {
            return Vec::new();
        }
        let mut keys = Vec::new();
        let candidates: [(&'static str, &Option<String>); 3] = [
            ("DB_PASSWORD", &self.db_password),
            ("ADMIN_PASSWORD", &self.admin_password),
            ("BUCKET_SECRET_ACCESS_KEY", &self.bucket_secret_access_key),
        ];
        for (key, value) in candidates {
            if value.as_deref().is_some_and(is_placeholder) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for key in self.placeholder_keys() {
            warnings.push(ConfigWarning::error(format!(
                "{key} holds a placeholder value; a real credential is required for non-local targets"
            )));
        }

        match &self.site_name {
            None => warnings.push(ConfigWarning::error("SITE_NAME is required")),
            Some(site) if !site_name_re().is_match(site) => {
                warnings.push(ConfigWarning::error(format!(
                    "SITE_NAME '{site}' is not a valid site identifier"
                )))
            }
            Some(_) => {}
        }

        if let Some(url) = self.public_url() {
            match parse_url(&url) {
                None => warnings.push(ConfigWarning::error(format!(
                    "SITE_URL '{url}' must look like http(s)://host[:port]"
                ))),
                Some(parsed) if parsed.port == Some(APP_LISTENER_PORT) => {
                    warnings.push(ConfigWarning::error(format!(
                        "SITE_URL '{url}' carries the internal listener port {APP_LISTENER_PORT}; \
                         use the public address instead"
                    )))
                }
                Some(ParsedUrl {
                    host,
                    port: Some(port),
                }) if is_loopback_host(&host) => {
                    warnings.push(ConfigWarning::error(format!(
                        "SITE_URL '{url}' pins loopback host {host} to port {port}; \
                         links built from it only work on this machine"
                    )))
                }
                Some(_) => {}
            }
        }

        if self.database_kind() == DatabaseKind::External {
            if self.db_name.is_none() {
                warnings.push(ConfigWarning::error(
                    "DB_NAME is required for an external database",
                ));
            }
            if self.db_user.is_none() {
                warnings.push(ConfigWarning::error(
                    "DB_USER is required for an external database",
                ));
            }
            if self.db_password.is_none() {
                warnings.push(ConfigWarning::error(
                    "DB_PASSWORD is required for an external database",
                ));
            }
        }

        if !self.is_local_target() && self.admin_password.is_none() {
            warnings.push(ConfigWarning::error(
                "ADMIN_PASSWORD is required for non-local targets",
            ));
        }

        if self.apps.is_empty() {
            warnings.push(ConfigWarning::error("APPS must name at least one bundle"));
        }

        if self.backup_interval_hours == 0 {
            warnings.push(ConfigWarning::error(
                "FILES_BACK_UP_HOURS must be a positive number of hours",
            ));
        }

        if self.connect_timeout_secs == 0 {
            warnings.push(ConfigWarning::error(
                "DB_CONNECT_TIMEOUT_SECS must be at least 1",
            ));
        }

        if self.has_any_bucket_key() && self.object_storage().is_none() {
            warnings.push(ConfigWarning::warning(
                "object storage is partially configured (need BUCKET_NAME, BUCKET_ACCESS_KEY_ID \
                 and BUCKET_SECRET_ACCESS_KEY); remote file storage and backups are disabled",
            ));
        }

        if self.allow_non_empty_schema {
            warnings.push(ConfigWarning::warning(
                "ALLOW_NON_EMPTY_SCHEMA is set; the populated-schema guard is bypassed",
            ));
        }

        warnings
    }

    /// Validate and build the immutable target plus decision policy.
    /// Fails before any state is probed.
    pub fn into_target(self) -> Result<(ProvisioningTarget, Policy)> {
        if let Some(key) = self.placeholder_keys().first() {
            return Err(ProvisionError::PlaceholderCredential {
                key: (*key).to_string(),
            });
        }
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if !errors.is_empty() {
            return Err(ProvisionError::Config(errors.join("; ")));
        }

        let kind = self.database_kind();
        let public_url = self
            .public_url()
            .ok_or_else(|| ProvisionError::Config("SITE_URL could not be derived".into()))?;
        let site = self
            .site_name
            .clone()
            .ok_or_else(|| ProvisionError::Config("SITE_NAME is required".into()))?;

        let database = match kind {
            DatabaseKind::External => DatabaseConnection {
                kind,
                host: self.db_host.clone().unwrap_or_default(),
                port: self.db_port,
                name: self.db_name.clone(),
                user: self.db_user.clone().unwrap_or_default(),
                password: Secret::new(self.db_password.clone().unwrap_or_default()),
                connect_timeout_secs: self.connect_timeout_secs,
            },
            DatabaseKind::Embedded => DatabaseConnection {
                kind,
                host: match self.db_host.as_deref() {
                    None | Some("local") => "mariadb".to_string(),
                    Some(h) => h.to_string(),
                },
                port: self.db_port,
                name: self.db_name.clone(),
                user: self.db_user.clone().unwrap_or_else(|| "root".to_string()),
                password: Secret::new(self.db_password.clone().unwrap_or_else(|| "123".into())),
                connect_timeout_secs: self.connect_timeout_secs,
            },
        };

        let object_storage = self.object_storage();
        let target = ProvisioningTarget {
            site,
            public_url,
            bench_dir: self.bench_dir,
            apps: self.apps,
            framework_branch: self.framework_branch,
            database,
            admin_password: Secret::new(self.admin_password.unwrap_or_else(|| "admin".into())),
            transports: Transports {
                socketio: self
                    .redis_socketio
                    .unwrap_or_else(|| self.redis_queue.clone()),
                cache: self.redis_cache,
                queue: self.redis_queue,
            },
            object_storage,
            backup_interval_hours: self.backup_interval_hours,
        };
        let policy = Policy {
            allow_non_empty_schema: self.allow_non_empty_schema,
            existing_site: self.existing_site,
        };
        Ok((target, policy))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_number<T: std::str::FromStr>(env: &EnvMap, key: &str) -> Result<Option<T>> {
    match env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ProvisionError::Config(format!("{key} must be a number, got '{raw}'"))),
    }
}

fn parse_flag(env: &EnvMap, key: &str) -> Result<bool> {
    match env
        .get(key)
        .map(|v| v.trim().to_ascii_lowercase())
        .as_deref()
    {
        None | Some("") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ProvisionError::Config(format!(
            "{key} must be true or false, got '{other}'"
        ))),
    }
}

fn site_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?$").unwrap())
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(changeme|change[_-]me|password|admin|secret|default|example|placeholder|todo|x{3,}|your[_-].*|<.*>|\$\{.*\}|123)$",
        )
        .unwrap()
    })
}

pub fn is_placeholder(value: &str) -> bool {
    placeholder_re().is_match(value.trim())
}

struct ParsedUrl {
    host: String,
    port: Option<u16>,
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://([^/:?#]+)(?::(\d+))?(?:[/?#].*)?$").unwrap())
}

fn parse_url(url: &str) -> Option<ParsedUrl> {
    let caps = url_re().captures(url)?;
    let host = caps.get(1)?.as_str().to_ascii_lowercase();
    let port = match caps.get(2) {
        Some(p) => Some(p.as_str().parse::<u16>().ok()?),
        None => None,
    };
    Some(ParsedUrl { host, port })
}

fn is_loopback_host(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1" || host.ends_with(".localhost")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
