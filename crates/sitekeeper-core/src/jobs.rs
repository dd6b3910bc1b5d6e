//! Periodic job store, keyed by the script a job runs.

use crate::error::Result;
use crate::runner::{CommandRunner, CommandSpec};
use std::cell::RefCell;

/// One periodic job. `identity` (the script path) is unique within the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
    pub schedule: String,
    pub identity: String,
    pub command: String,
}

impl JobEntry {
    pub fn line(&self) -> String {
        format!("{} {}", self.schedule, self.command)
    }
}

pub trait JobStore {
    fn load(&self) -> Result<Vec<String>>;
    fn save(&self, lines: &[String]) -> Result<()>;
}

/// Single-quote `value` for `/bin/sh`.
pub fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// The command part of a job line: everything after the five schedule
/// fields, or after an `@keyword` schedule. `None` for comments, blank lines
/// and variable assignments.
fn command_of(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let fields = if trimmed.starts_with('@') { 1 } else { 5 };
    let mut rest = trimmed;
    for _ in 0..fields {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        rest = &rest[end..];
    }
    Some(rest.trim_start())
}

/// A line belongs to `identity` when its command starts with the identity,
/// quoted or bare, followed by whitespace or the end of the line.
fn belongs_to(line: &str, identity: &str) -> bool {
    let Some(command) = command_of(line) else {
        return false;
    };
    [sh_quote(identity), identity.to_string()].iter().any(|form| {
        command
            .strip_prefix(form.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

/// Replace every entry for the same identity with `entry`.
/// Returns `false` when the store already held exactly that entry once.
pub fn register(store: &dyn JobStore, entry: &JobEntry) -> Result<bool> {
    let lines = store.load()?;
    let desired = entry.line();
    let existing: Vec<&String> = lines
        .iter()
        .filter(|l| belongs_to(l, &entry.identity))
        .collect();
    if existing.len() == 1 && existing[0].trim() == desired {
        return Ok(false);
    }
    let mut kept: Vec<String> = lines
        .iter()
        .filter(|l| !belongs_to(l, &entry.identity))
        .cloned()
        .collect();
    if existing.len() > 1 {
        tracing::info!(
            identity = %entry.identity,
            removed = existing.len(),
            "collapsing duplicate job registrations"
        );
    }
    kept.push(desired);
    store.save(&kept)?;
    Ok(true)
}

pub fn registrations(store: &dyn JobStore, identity: &str) -> Result<usize> {
    Ok(store
        .load()?
        .iter()
        .filter(|l| belongs_to(l, identity))
        .count())
}

// ---------------------------------------------------------------------------
// CrontabStore
// ---------------------------------------------------------------------------

/// The invoking user's crontab.
pub struct CrontabStore<'r> {
    runner: &'r dyn CommandRunner,
}

impl<'r> CrontabStore<'r> {
    pub fn new(runner: &'r dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl JobStore for CrontabStore<'_> {
    fn load(&self) -> Result<Vec<String>> {
        let spec = CommandSpec::new("crontab").arg("-l");
        let output = self.runner.run(&spec)?;
        // `crontab -l` exits 1 with "no crontab for <user>" on a fresh host.
        if !output.success() && output.stderr.contains("no crontab") {
            return Ok(Vec::new());
        }
        let output = output.into_result(&spec)?;
        Ok(output.stdout.lines().map(str::to_string).collect())
    }

    fn save(&self, lines: &[String]) -> Result<()> {
        let mut body = lines.join("\n");
        body.push('\n');
        let spec = CommandSpec::new("crontab").arg("-").stdin(body);
        self.runner.run(&spec)?.into_result(&spec)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryJobStore
// ---------------------------------------------------------------------------

/// In-process store for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    lines: RefCell<Vec<String>>,
    saves: RefCell<u32>,
}

impl MemoryJobStore {
    pub fn with_lines(lines: &[&str]) -> Self {
        Self {
            lines: RefCell::new(lines.iter().map(|l| l.to_string()).collect()),
            saves: RefCell::new(0),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn saves(&self) -> u32 {
        *self.saves.borrow()
    }
}

impl JobStore for MemoryJobStore {
    fn load(&self) -> Result<Vec<String>> {
        Ok(self.lines.borrow().clone())
    }

    fn save(&self, lines: &[String]) -> Result<()> {
        *self.lines.borrow_mut() = lines.to_vec();
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}
