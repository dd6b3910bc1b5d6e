//! Recording doubles for the external collaborators.
//!
//! `RecordingControlPlane` simulates the filesystem and schema effects the
//! real bench would have, so a second reconcile pass observes the first.

use crate::control_plane::{ApplicationControlPlane, NewSiteRequest};
use crate::error::{ProvisionError, Result};
use crate::paths;
use crate::schema::SchemaInspector;
use crate::site_config;
use crate::target::DatabaseConnection;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// FakeDatabase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schema {
    Missing,
    Tables { count: u64, marker: bool },
    Unreachable,
}

pub struct FakeDatabase {
    schema: Cell<Schema>,
    queries: Cell<u32>,
}

impl FakeDatabase {
    fn with(schema: Schema) -> Self {
        Self {
            schema: Cell::new(schema),
            queries: Cell::new(0),
        }
    }

    pub fn missing_schema() -> Self {
        Self::with(Schema::Missing)
    }

    pub fn empty() -> Self {
        Self::with(Schema::Tables {
            count: 0,
            marker: false,
        })
    }

    pub fn populated(count: u64, marker: bool) -> Self {
        Self::with(Schema::Tables { count, marker })
    }

    pub fn unreachable() -> Self {
        Self::with(Schema::Unreachable)
    }

    /// What a successful site creation leaves behind.
    pub fn initialize(&self) {
        let count = match self.schema.get() {
            Schema::Tables { count, .. } => count.max(812),
            _ => 812,
        };
        self.schema.set(Schema::Tables {
            count,
            marker: true,
        });
    }

    pub fn table_count(&self) -> u64 {
        match self.schema.get() {
            Schema::Tables { count, .. } => count,
            _ => 0,
        }
    }

    pub fn queries(&self) -> u32 {
        self.queries.get()
    }
}

impl SchemaInspector for FakeDatabase {
    fn scalar(&self, _db: &DatabaseConnection, sql: &str) -> Result<Option<String>> {
        self.queries.set(self.queries.get() + 1);
        let (count, marker) = match self.schema.get() {
            Schema::Unreachable => {
                return Err(ProvisionError::CommandFailed {
                    command: "mysql".into(),
                    status: "exit 1".into(),
                    output: "ERROR 2003 (HY000): Can't connect to MySQL server".into(),
                })
            }
            Schema::Missing => return Ok(None),
            Schema::Tables { count, marker } => (count, marker),
        };
        if sql.contains("COUNT(*)") {
            Ok(Some(count.to_string()))
        } else if sql.contains(paths::MARKER_TABLE) {
            Ok(marker.then(|| "1".to_string()))
        } else {
            Ok(Some("1".to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingControlPlane
// ---------------------------------------------------------------------------

pub struct RecordingControlPlane<'a> {
    bench: PathBuf,
    db: Option<&'a FakeDatabase>,
    calls: RefCell<Vec<String>>,
    new_site_failures: Cell<u32>,
    migrate_fails: Cell<bool>,
    installed: RefCell<BTreeSet<String>>,
}

impl<'a> RecordingControlPlane<'a> {
    pub fn new(bench: &Path) -> Self {
        Self {
            bench: bench.to_path_buf(),
            db: None,
            calls: RefCell::new(Vec::new()),
            new_site_failures: Cell::new(0),
            migrate_fails: Cell::new(false),
            installed: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn with_database(mut self, db: &'a FakeDatabase) -> Self {
        self.db = Some(db);
        self
    }

    /// The next `n` site creations fail after leaving a partial site directory.
    pub fn fail_new_site(self, n: u32) -> Self {
        self.new_site_failures.set(n);
        self
    }

    /// Bundles the site's schema already holds.
    pub fn with_installed(self, apps: &[&str]) -> Self {
        self.installed
            .borrow_mut()
            .extend(apps.iter().map(|a| a.to_string()));
        self
    }

    pub fn fail_migrate(self) -> Self {
        self.migrate_fails.set(true);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(verb))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn failure(&self, command: &str, output: &str) -> ProvisionError {
        ProvisionError::CommandFailed {
            command: command.to_string(),
            status: "exit 1".to_string(),
            output: output.to_string(),
        }
    }
}

impl ApplicationControlPlane for RecordingControlPlane<'_> {
    fn init_scaffold(&self, _framework_branch: Option<&str>) -> Result<()> {
        self.record("init_scaffold".to_string());
        std::fs::create_dir_all(paths::app_dir(&self.bench, "frappe"))?;
        std::fs::create_dir_all(paths::sites_dir(&self.bench))?;
        Ok(())
    }

    fn fetch_app(&self, app: &str) -> Result<()> {
        self.record(format!("fetch_app {app}"));
        std::fs::create_dir_all(paths::app_dir(&self.bench, app))?;
        Ok(())
    }

    fn new_site(&self, request: &NewSiteRequest<'_>) -> Result<()> {
        self.record(format!("new_site {}", request.site));
        let site_dir = paths::site_dir(&self.bench, request.site);
        std::fs::create_dir_all(site_dir.join("private/backups"))?;

        let remaining = self.new_site_failures.get();
        if remaining > 0 {
            self.new_site_failures.set(remaining - 1);
            return Err(self.failure("bench new-site", "pymysql.err.OperationalError: (2013, 'Lost connection')"));
        }

        let db_name = request
            .db
            .name
            .clone()
            .unwrap_or_else(|| "_5e5f3c0a1b2d".to_string());
        site_config::merge(
            &paths::site_config(&self.bench, request.site),
            &[("db_name", json!(db_name)), ("db_password", json!("generated"))],
        )?;
        if let Some(db) = self.db {
            db.initialize();
        }
        let mut installed = self.installed.borrow_mut();
        installed.insert("frappe".to_string());
        installed.extend(request.install_apps.iter().cloned());
        Ok(())
    }

    fn installed_apps(&self, _site: &str) -> Result<Vec<String>> {
        Ok(self.installed.borrow().iter().cloned().collect())
    }

    fn install_app(&self, site: &str, app: &str) -> Result<()> {
        self.record(format!("install_app {site} {app}"));
        self.installed.borrow_mut().insert(app.to_string());
        Ok(())
    }

    fn set_config(&self, site: &str, key: &str, value: &Value) -> Result<()> {
        self.record(format!("set_config {key}"));
        site_config::merge(&paths::site_config(&self.bench, site), &[(key, value.clone())])?;
        Ok(())
    }

    fn enable_scheduler(&self, site: &str) -> Result<()> {
        self.record(format!("enable_scheduler {site}"));
        Ok(())
    }

    fn clear_cache(&self, site: &str) -> Result<()> {
        self.record(format!("clear_cache {site}"));
        Ok(())
    }

    fn migrate(&self, site: &str) -> Result<()> {
        self.record(format!("migrate {site}"));
        if self.migrate_fails.get() {
            return Err(self.failure("bench migrate", "frappe.exceptions.ValidationError: bad patch"));
        }
        Ok(())
    }
}
