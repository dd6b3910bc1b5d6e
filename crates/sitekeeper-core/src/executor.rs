//! Action executor: carries out the one decided action.
//!
//! Everything goes through [`ApplicationControlPlane`]; the only files written
//! directly are the bench's JSON config files. Site creation is never
//! blind-retried: after a failure the state is re-probed and a single retry
//! happens only when the failed attempt provably left nothing behind.

use crate::control_plane::{ApplicationControlPlane, NewSiteRequest};
use crate::decision::Policy;
use crate::error::{ProvisionError, Result};
use crate::paths;
use crate::prober;
use crate::schema::{self, SchemaInspector};
use crate::site_config;
use crate::target::ProvisioningTarget;
use crate::types::{Action, BenchState};
use serde::Serialize;
use serde_json::{json, Value};

pub struct Executor<'a> {
    pub target: &'a ProvisioningTarget,
    pub policy: Policy,
    pub control: &'a dyn ApplicationControlPlane,
    pub inspector: &'a dyn SchemaInspector,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub action: Action,
    pub steps: Vec<String>,
    pub site_creation_retried: bool,
}

impl ExecutionReport {
    fn new(action: Action) -> Self {
        Self {
            action,
            steps: Vec::new(),
            site_creation_retried: false,
        }
    }

    fn step(&mut self, step: impl Into<String>) {
        let step = step.into();
        tracing::info!(step = %step, "executed");
        self.steps.push(step);
    }
}

impl<'a> Executor<'a> {
    pub fn execute(&self, bench: BenchState, action: Action) -> Result<ExecutionReport> {
        let mut report = ExecutionReport::new(action);
        match action {
            Action::RefuseNonEmptyForeignSchema { table_count } => {
                return Err(ProvisionError::GuardRefusal {
                    schema: self.target.database.display_name().to_string(),
                    table_count,
                });
            }
            Action::CreateFreshSite => {
                self.ensure_scaffold(bench, &mut report)?;
                self.write_common_config(&mut report)?;
                self.create_site(bench, &mut report)?;
                if self.target.database.is_external() {
                    self.refresh_site_db_host(&mut report)?;
                }
            }
            Action::AdoptExistingExternalSchema => {
                self.ensure_scaffold(bench, &mut report)?;
                self.write_common_config(&mut report)?;
                self.write_site_db_config(&mut report)?;
                self.control.migrate(&self.target.site)?;
                report.step("migrate");
                self.install_missing_apps(&mut report)?;
            }
            Action::MigrateExistingSite => {
                self.ensure_scaffold(bench, &mut report)?;
                self.write_common_config(&mut report)?;
                if self.target.database.is_external() {
                    self.refresh_site_db_host(&mut report)?;
                }
                self.control.migrate(&self.target.site)?;
                report.step("migrate");
                self.install_missing_apps(&mut report)?;
            }
        }
        Ok(report)
    }

    /// Init the bench when absent, then fetch any configured bundle that is
    /// not checked out under `apps/`.
    fn ensure_scaffold(&self, bench: BenchState, report: &mut ExecutionReport) -> Result<()> {
        if bench == BenchState::Absent {
            self.control
                .init_scaffold(self.target.framework_branch.as_deref())?;
            report.step("init_scaffold");
        }
        for app in &self.target.apps {
            if !paths::app_dir(&self.target.bench_dir, app).is_dir() {
                self.control.fetch_app(app)?;
                report.step(format!("fetch_app {app}"));
            }
        }
        Ok(())
    }

    /// Install configured bundles the existing site does not have yet.
    fn install_missing_apps(&self, report: &mut ExecutionReport) -> Result<()> {
        let site = &self.target.site;
        let installed = self.control.installed_apps(site)?;
        for app in &self.target.apps {
            if !installed.contains(app) {
                self.control.install_app(site, app)?;
                report.step(format!("install_app {app}"));
            }
        }
        Ok(())
    }

    fn write_common_config(&self, report: &mut ExecutionReport) -> Result<()> {
        let db = &self.target.database;
        let transports = &self.target.transports;
        let changed = site_config::merge(
            &paths::common_site_config(&self.target.bench_dir),
            &[
                ("db_host", json!(db.host)),
                ("db_port", json!(db.port)),
                ("redis_cache", json!(transports.cache)),
                ("redis_queue", json!(transports.queue)),
                ("redis_socketio", json!(transports.socketio)),
            ],
        )?;
        if !changed.is_empty() {
            report.step(format!("common config: {}", changed.join(", ")));
        }
        Ok(())
    }

    fn write_site_db_config(&self, report: &mut ExecutionReport) -> Result<()> {
        let db = &self.target.database;
        let name = db.name.as_deref().ok_or_else(|| {
            ProvisionError::Config("adopting an external schema requires DB_NAME".into())
        })?;
        let updates: [(&str, Value); 6] = [
            ("db_name", json!(name)),
            ("db_user", json!(db.user)),
            ("db_password", json!(db.password.expose())),
            ("db_type", json!("mariadb")),
            ("db_host", json!(db.host)),
            ("db_port", json!(db.port)),
        ];
        let changed = site_config::merge(
            &paths::site_config(&self.target.bench_dir, &self.target.site),
            &updates,
        )?;
        if !changed.is_empty() {
            report.step(format!("site config: {}", changed.join(", ")));
        }
        Ok(())
    }

    fn refresh_site_db_host(&self, report: &mut ExecutionReport) -> Result<()> {
        let db = &self.target.database;
        let changed = site_config::merge(
            &paths::site_config(&self.target.bench_dir, &self.target.site),
            &[("db_host", json!(db.host)), ("db_port", json!(db.port))],
        )?;
        if !changed.is_empty() {
            report.step(format!("site config: {}", changed.join(", ")));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Site creation
    // -----------------------------------------------------------------------

    fn create_site(&self, bench: BenchState, report: &mut ExecutionReport) -> Result<()> {
        let request = NewSiteRequest {
            site: &self.target.site,
            db: &self.target.database,
            admin_password: &self.target.admin_password,
            install_apps: &self.target.apps,
            skip_privileged_account_ops: self.target.database.is_external(),
        };

        self.guard(bench)?;
        let first = match self.control.new_site(&request) {
            Ok(()) => {
                report.step("new_site");
                return Ok(());
            }
            Err(e) => e,
        };

        if !self.safe_to_retry()? {
            return Err(first);
        }
        tracing::warn!(
            site = %self.target.site,
            error = %first,
            "site creation failed without leaving data behind; retrying once"
        );
        std::fs::remove_dir_all(paths::site_dir(&self.target.bench_dir, &self.target.site))?;
        report.site_creation_retried = true;

        self.guard(bench)?;
        self.control.new_site(&request)?;
        report.step("new_site (retry)");
        Ok(())
    }

    /// Re-check the schema right before a schema-initializing command.
    fn guard(&self, bench: BenchState) -> Result<()> {
        let db = &self.target.database;
        if !db.is_external() || self.policy.allow_non_empty_schema {
            return Ok(());
        }
        let facts = schema::inspect(self.inspector, db).map_err(|e| {
            ProvisionError::AmbiguousState(format!(
                "could not re-check schema '{}' before site creation: {e}",
                db.display_name()
            ))
        })?;
        let foreign_data = bench.is_fresh() && facts.table_count > 0;
        if facts.has_marker || foreign_data {
            return Err(ProvisionError::GuardRefusal {
                schema: db.display_name().to_string(),
                table_count: facts.table_count,
            });
        }
        Ok(())
    }

    /// A failed creation may be retried only if it left a site directory
    /// with no user files and, for external databases, no marker table.
    fn safe_to_retry(&self) -> Result<bool> {
        let site_dir = paths::site_dir(&self.target.bench_dir, &self.target.site);
        if !site_dir.is_dir() {
            tracing::info!("failed site creation left no site directory; not retrying");
            return Ok(false);
        }
        if prober::site_has_user_files(self.target)? {
            tracing::warn!(path = %site_dir.display(), "site directory holds user files; not retrying");
            return Ok(false);
        }
        let db = &self.target.database;
        if db.is_external() {
            match schema::inspect(self.inspector, db) {
                Ok(facts) if !facts.has_marker => {}
                Ok(_) => {
                    tracing::warn!("failed site creation left the marker table; not retrying");
                    return Ok(false);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "schema unreadable after failed site creation; not retrying");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
