//! The application's own command surface, as a capability.
//!
//! The reconciler never edits the framework's internals; it asks the bench
//! CLI to do things and trusts only the exit status. [`BenchCli`] is the real
//! implementation; tests substitute a recording double.

use crate::error::Result;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::runner::{CommandRunner, CommandSpec};
use crate::target::{DatabaseConnection, Secret};
use serde_json::Value;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// NewSiteRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewSiteRequest<'a> {
    pub site: &'a str,
    pub db: &'a DatabaseConnection,
    pub admin_password: &'a Secret,
    pub install_apps: &'a [String],
    /// Managed databases forbid account creation and GRANTs. When set, site
    /// creation must rely on the already-privileged connection user instead.
    pub skip_privileged_account_ops: bool,
}

// ---------------------------------------------------------------------------
// ApplicationControlPlane
// ---------------------------------------------------------------------------

pub trait ApplicationControlPlane {
    /// Create the runtime scaffold (framework checkout, `apps/`, `sites/`).
    fn init_scaffold(&self, framework_branch: Option<&str>) -> Result<()>;
    fn fetch_app(&self, app: &str) -> Result<()>;
    /// Schema-initializing. Never retried blindly.
    fn new_site(&self, request: &NewSiteRequest<'_>) -> Result<()>;
    /// Bundles installed into the site's schema.
    fn installed_apps(&self, site: &str) -> Result<Vec<String>>;
    fn install_app(&self, site: &str, app: &str) -> Result<()>;
    fn set_config(&self, site: &str, key: &str, value: &Value) -> Result<()>;
    fn enable_scheduler(&self, site: &str) -> Result<()>;
    fn clear_cache(&self, site: &str) -> Result<()>;
    fn migrate(&self, site: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// BenchCli
// ---------------------------------------------------------------------------

pub struct BenchCli<'r> {
    program: String,
    bench_dir: PathBuf,
    runner: &'r dyn CommandRunner,
    retry: RetryPolicy,
}

impl<'r> BenchCli<'r> {
    pub fn new(
        program: impl Into<String>,
        bench_dir: &Path,
        runner: &'r dyn CommandRunner,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            program: program.into(),
            bench_dir: bench_dir.to_path_buf(),
            runner,
            retry,
        }
    }

    fn bench(&self) -> CommandSpec {
        CommandSpec::new(&self.program).current_dir(&self.bench_dir)
    }

    fn site_cmd(&self, site: &str) -> CommandSpec {
        self.bench().args(["--site", site])
    }

    /// Transient lock contention is retried; anything else fails verbatim.
    fn invoke(&self, spec: CommandSpec) -> Result<()> {
        run_with_retry(self.runner, &spec, &self.retry)?.into_result(&spec)?;
        Ok(())
    }

    fn invoke_once(&self, spec: CommandSpec) -> Result<()> {
        self.runner.run(&spec)?.into_result(&spec)?;
        Ok(())
    }

    pub fn new_site_command(&self, request: &NewSiteRequest<'_>) -> CommandSpec {
        let db = request.db;
        let mut spec = self
            .bench()
            .args(["new-site", request.site])
            .args(["--db-host", db.host.as_str()])
            .arg("--db-port")
            .arg(db.port.to_string())
            .args(["--db-root-username", db.user.as_str()])
            .arg("--db-root-password")
            .secret_arg(db.password.expose())
            .arg("--admin-password")
            .secret_arg(request.admin_password.expose());
        if let Some(name) = &db.name {
            spec = spec.args(["--db-name", name.as_str()]);
        }
        if request.skip_privileged_account_ops {
            // Bootstrap only: no CREATE USER / GRANT; connect as the given user.
            spec = spec
                .args(["--setup-db", "false"])
                .args(["--db-user", db.user.as_str()])
                .arg("--db-password")
                .secret_arg(db.password.expose());
        }
        for app in request.install_apps {
            spec = spec.args(["--install-app", app.as_str()]);
        }
        spec
    }

    pub fn set_config_command(&self, site: &str, key: &str, value: &Value) -> CommandSpec {
        let spec = self.site_cmd(site).arg("set-config");
        match value {
            Value::String(s) => spec.args([key, s.as_str()]),
            other => spec.args(["-p", key]).arg(other.to_string()),
        }
    }
}

/// `list-apps` prints one bundle per line, optionally followed by its
/// version and branch.
fn parse_app_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

impl ApplicationControlPlane for BenchCli<'_> {
    fn init_scaffold(&self, framework_branch: Option<&str>) -> Result<()> {
        let parent = self
            .bench_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut spec = CommandSpec::new(&self.program)
            .current_dir(parent)
            .args(["init", "--skip-redis-config-generation"]);
        if let Some(branch) = framework_branch {
            spec = spec.args(["--frappe-branch", branch]);
        }
        let name = self
            .bench_dir
            .file_name()
            .unwrap_or(self.bench_dir.as_os_str())
            .to_string_lossy()
            .into_owned();
        spec = spec.arg(name);
        self.invoke(spec)
    }

    fn fetch_app(&self, app: &str) -> Result<()> {
        self.invoke(self.bench().args(["get-app", app]))
    }

    fn new_site(&self, request: &NewSiteRequest<'_>) -> Result<()> {
        self.invoke_once(self.new_site_command(request))
    }

    fn installed_apps(&self, site: &str) -> Result<Vec<String>> {
        let spec = self.site_cmd(site).arg("list-apps");
        let output = run_with_retry(self.runner, &spec, &self.retry)?.into_result(&spec)?;
        Ok(parse_app_list(&output.stdout))
    }

    fn install_app(&self, site: &str, app: &str) -> Result<()> {
        self.invoke(self.site_cmd(site).args(["install-app", app]))
    }

    fn set_config(&self, site: &str, key: &str, value: &Value) -> Result<()> {
        self.invoke(self.set_config_command(site, key, value))
    }

    fn enable_scheduler(&self, site: &str) -> Result<()> {
        self.invoke(self.site_cmd(site).arg("enable-scheduler"))
    }

    fn clear_cache(&self, site: &str) -> Result<()> {
        self.invoke(self.site_cmd(site).arg("clear-cache"))
    }

    fn migrate(&self, site: &str) -> Result<()> {
        self.invoke(self.site_cmd(site).arg("migrate"))
    }
}
