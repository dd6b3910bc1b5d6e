//! Relational client used to classify an external schema.
//!
//! Only `information_schema` is read. Every query goes through
//! [`SchemaInspector::scalar`]; an `Err` from it means "could not find out",
//! which callers must never read as "populated".

use crate::error::{ProvisionError, Result};
use crate::paths::MARKER_TABLE;
use crate::runner::{tool_available, CommandRunner, CommandSpec};
use crate::target::DatabaseConnection;

pub trait SchemaInspector {
    /// First column of the first row, trimmed; `None` for an empty result.
    fn scalar(&self, db: &DatabaseConnection, sql: &str) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

pub fn schema_exists_sql(schema: &str) -> String {
    format!(
        "SELECT 1 FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = {}",
        quote(schema)
    )
}

pub fn marker_sql(schema: &str) -> String {
    format!(
        "SELECT 1 FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
        quote(schema),
        quote(MARKER_TABLE)
    )
}

pub fn table_count_sql(schema: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = {}",
        quote(schema)
    )
}

// ---------------------------------------------------------------------------
// Facts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaFacts {
    pub exists: bool,
    pub has_marker: bool,
    pub table_count: u64,
}

/// Collect existence, marker presence and table count. Any query failure
/// aborts the whole inspection.
pub fn inspect(inspector: &dyn SchemaInspector, db: &DatabaseConnection) -> Result<SchemaFacts> {
    let schema = db
        .name
        .as_deref()
        .ok_or_else(|| ProvisionError::Config("external database has no DB_NAME".into()))?;

    let exists = inspector.scalar(db, &schema_exists_sql(schema))?.as_deref() == Some("1");
    if !exists {
        return Ok(SchemaFacts {
            exists: false,
            has_marker: false,
            table_count: 0,
        });
    }
    let has_marker = inspector.scalar(db, &marker_sql(schema))?.as_deref() == Some("1");
    let raw = inspector.scalar(db, &table_count_sql(schema))?;
    let table_count = match raw.as_deref() {
        None => 0,
        Some(n) => n.parse::<u64>().map_err(|_| {
            ProvisionError::AmbiguousState(format!("table count query returned '{n}'"))
        })?,
    };
    Ok(SchemaFacts {
        exists: true,
        has_marker,
        table_count,
    })
}

/// Marker check that fails closed: anything other than a definite `1`,
/// including connection failure or a missing client, is `false`.
pub fn marker_present(inspector: &dyn SchemaInspector, db: &DatabaseConnection) -> bool {
    let Some(schema) = db.name.as_deref() else {
        return false;
    };
    match inspector.scalar(db, &marker_sql(schema)) {
        Ok(value) => value.as_deref() == Some("1"),
        Err(e) => {
            tracing::warn!(error = %e, "marker table query failed; treating schema as uninitialized");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// MysqlCli
// ---------------------------------------------------------------------------

/// Queries through the `mysql` command-line client with a bounded connect timeout.
/// The password travels in `MYSQL_PWD`, never on the command line.
pub struct MysqlCli<'r> {
    program: String,
    runner: &'r dyn CommandRunner,
}

impl<'r> MysqlCli<'r> {
    pub fn new(program: impl Into<String>, runner: &'r dyn CommandRunner) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    fn command(&self, db: &DatabaseConnection, sql: &str) -> CommandSpec {
        CommandSpec::new(&self.program)
            .arg(format!("--connect-timeout={}", db.connect_timeout_secs))
            .arg("-h")
            .arg(&db.host)
            .arg("-P")
            .arg(db.port.to_string())
            .arg("-u")
            .arg(&db.user)
            .args(["--batch", "--skip-column-names"])
            .args(["-e", sql])
            .env("MYSQL_PWD", db.password.expose())
    }
}

impl SchemaInspector for MysqlCli<'_> {
    fn scalar(&self, db: &DatabaseConnection, sql: &str) -> Result<Option<String>> {
        if !tool_available(&self.program) {
            return Err(ProvisionError::ToolNotFound(self.program.clone()));
        }
        let spec = self.command(db, sql);
        let output = self.runner.run(&spec)?.into_result(&spec)?;
        Ok(output
            .stdout
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()))
    }
}
