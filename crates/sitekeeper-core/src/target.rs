//! The immutable description of the one tenant a run provisions.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never appears in `Debug` output, logs, or JSON.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseKind {
    /// Local, disposable database run next to the bench.
    Embedded,
    /// Managed database reached over the network; holds production data.
    External,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseConnection {
    pub kind: DatabaseKind,
    pub host: String,
    pub port: u16,
    /// Schema name. `None` lets the application derive one (embedded only).
    pub name: Option<String>,
    pub user: String,
    pub password: Secret,
    pub connect_timeout_secs: u64,
}

impl DatabaseConnection {
    pub fn is_external(&self) -> bool {
        self.kind == DatabaseKind::External
    }

    /// Schema name used in diagnostics.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<derived>")
    }
}

// ---------------------------------------------------------------------------
// Object storage / transports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ObjectStorage {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: Secret,
}

/// Cache/queue transport locations written into the shared config.
#[derive(Debug, Clone, Serialize)]
pub struct Transports {
    pub cache: String,
    pub queue: String,
    pub socketio: String,
}

// ---------------------------------------------------------------------------
// ProvisioningTarget
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningTarget {
    pub site: String,
    /// Externally visible base URL; becomes the site's `host_name`.
    pub public_url: String,
    pub bench_dir: PathBuf,
    /// Application bundles installed into the site, in install order.
    pub apps: Vec<String>,
    pub framework_branch: Option<String>,
    pub database: DatabaseConnection,
    pub admin_password: Secret,
    pub transports: Transports,
    pub object_storage: Option<ObjectStorage>,
    pub backup_interval_hours: u32,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::path::Path;

    pub fn embedded(bench: &Path) -> ProvisioningTarget {
        ProvisioningTarget {
            site: "hr.localhost".to_string(),
            public_url: "http://hr.localhost".to_string(),
            bench_dir: bench.to_path_buf(),
            apps: vec!["erpnext".to_string(), "hrms".to_string()],
            framework_branch: None,
            database: DatabaseConnection {
                kind: DatabaseKind::Embedded,
                host: "mariadb".to_string(),
                port: 3306,
                name: None,
                user: "root".to_string(),
                password: Secret::new("123"),
                connect_timeout_secs: 5,
            },
            admin_password: Secret::new("admin"),
            transports: Transports {
                cache: "redis://redis-cache:6379".to_string(),
                queue: "redis://redis-queue:6379".to_string(),
                socketio: "redis://redis-queue:6379".to_string(),
            },
            object_storage: None,
            backup_interval_hours: 6,
        }
    }

    pub fn external(bench: &Path) -> ProvisioningTarget {
        let mut target = embedded(bench);
        target.site = "hr.example.com".to_string();
        target.public_url = "https://hr.example.com".to_string();
        target.database = DatabaseConnection {
            kind: DatabaseKind::External,
            host: "tenant.cluster.rds.amazonaws.com".to_string(),
            port: 3306,
            name: Some("tenant_db".to_string()),
            user: "dbadmin".to_string(),
            password: Secret::new("Qx9-tenant-pass"),
            connect_timeout_secs: 5,
        };
        target.admin_password = Secret::new("Adm1n-strong");
        target
    }

    pub fn with_bucket(mut target: ProvisioningTarget) -> ProvisioningTarget {
        target.object_storage = Some(ObjectStorage {
            bucket: "tenant-files".to_string(),
            endpoint: Some("https://s3.us-east-1.amazonaws.com".to_string()),
            region: Some("us-east-1".to_string()),
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: Secret::new("bucket-secret"),
        });
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_redacted() {
        let s = Secret::new("hunter2");
        assert_eq!(format!("{s:?}"), "Secret(***)");
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"***\"");
        assert_eq!(s.expose(), "hunter2");
    }

    #[test]
    fn target_json_hides_passwords() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = fixtures::external(dir.path());
        let json = serde_json::to_string(&target).unwrap();
        assert!(!json.contains("Qx9-tenant-pass"));
        assert!(!json.contains("Adm1n-strong"));
        assert!(json.contains("tenant_db"));
    }
}
