//! Backup scheduler reconciler.
//!
//! Registers one periodic off-host sync of the site's file areas, and only
//! once there is something to back up. A registration is never removed by
//! this module: an empty file area is a reason to wait, not to undo.

use crate::error::Result;
use crate::io;
use crate::jobs::{self, sh_quote, JobEntry, JobStore};
use crate::paths;
use crate::prober;
use crate::target::{ObjectStorage, ProvisioningTarget};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackupStatus {
    Registered { schedule: String, changed: bool },
    /// No user files yet; the next run checks again.
    AwaitingData,
    /// Files exist but no object storage is configured.
    NotConfigured,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::Registered { .. } => "registered",
            BackupStatus::AwaitingData => "awaiting_data",
            BackupStatus::NotConfigured => "not_configured",
        }
    }
}

/// `0 */N * * *`, collapsing to once a day at N ≥ 24.
pub fn schedule(interval_hours: u32) -> String {
    if interval_hours >= 24 {
        "0 0 * * *".to_string()
    } else {
        format!("0 */{} * * *", interval_hours.max(1))
    }
}

fn sync_line(local: &Path, remote: &str, storage: &ObjectStorage) -> String {
    let mut line = format!(
        "aws s3 sync {} {} --delete",
        sh_quote(&local.to_string_lossy()),
        sh_quote(remote)
    );
    if let Some(endpoint) = &storage.endpoint {
        line.push_str(&format!(" --endpoint-url {}", sh_quote(endpoint)));
    }
    line
}

pub fn render_script(target: &ProvisioningTarget, storage: &ObjectStorage) -> String {
    let bench = &target.bench_dir;
    let prefix = format!("s3://{}/{}", storage.bucket, target.site);
    let mut script = String::from("#!/bin/sh\n# Generated by sitekeeper; rewritten on every reconcile.\nset -eu\n\n");
    script.push_str(&format!(
        "export AWS_ACCESS_KEY_ID={}\n",
        sh_quote(&storage.access_key_id)
    ));
    script.push_str(&format!(
        "export AWS_SECRET_ACCESS_KEY={}\n",
        sh_quote(storage.secret_access_key.expose())
    ));
    if let Some(region) = &storage.region {
        script.push_str(&format!("export AWS_DEFAULT_REGION={}\n", sh_quote(region)));
    }
    script.push('\n');
    script.push_str(&sync_line(
        &paths::private_files(bench, &target.site),
        &format!("{prefix}/private/files"),
        storage,
    ));
    script.push('\n');
    script.push_str(&sync_line(
        &paths::public_files(bench, &target.site),
        &format!("{prefix}/public/files"),
        storage,
    ));
    script.push('\n');
    script
}

pub fn job_entry(target: &ProvisioningTarget) -> JobEntry {
    let script = paths::backup_script(&target.bench_dir)
        .to_string_lossy()
        .into_owned();
    let log = paths::backup_log(&target.bench_dir)
        .to_string_lossy()
        .into_owned();
    JobEntry {
        schedule: schedule(target.backup_interval_hours),
        command: format!("{} >> {} 2>&1", sh_quote(&script), sh_quote(&log)),
        identity: script,
    }
}

fn write_script(path: &Path, content: &str) -> Result<()> {
    if std::fs::read_to_string(path).ok().as_deref() == Some(content) {
        return Ok(());
    }
    io::atomic_write_script(path, content.as_bytes())
}

pub fn reconcile(target: &ProvisioningTarget, store: &dyn JobStore) -> Result<BackupStatus> {
    if !prober::site_has_user_files(target)? {
        tracing::info!(site = %target.site, "no user files yet; backup registration deferred");
        return Ok(BackupStatus::AwaitingData);
    }
    let Some(storage) = &target.object_storage else {
        tracing::warn!(site = %target.site, "user files exist but no BUCKET_NAME is configured; skipping backup");
        return Ok(BackupStatus::NotConfigured);
    };

    write_script(
        &paths::backup_script(&target.bench_dir),
        &render_script(target, storage),
    )?;
    let entry = job_entry(target);
    let changed = jobs::register(store, &entry)?;
    if changed {
        tracing::info!(schedule = %entry.schedule, "backup job registered");
    }
    Ok(BackupStatus::Registered {
        schedule: entry.schedule,
        changed,
    })
}
