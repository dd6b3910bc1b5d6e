use crate::backup::BackupStatus;
use crate::error::Result;
use crate::paths;
use crate::types::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// RunRecord
// ---------------------------------------------------------------------------

/// What the last completed pass did, kept under `<bench>/.sitekeeper/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    pub site: String,
    pub last_action: Action,
    pub rule: String,
    pub completed_at: DateTime<Utc>,
    pub backup: BackupStatus,
    #[serde(default)]
    pub runs: u32,
}

fn default_version() -> u32 {
    1
}

impl RunRecord {
    pub fn new(site: impl Into<String>, action: Action, rule: impl Into<String>, backup: BackupStatus) -> Self {
        Self {
            version: 1,
            site: site.into(),
            last_action: action,
            rule: rule.into(),
            completed_at: Utc::now(),
            backup,
            runs: 1,
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    /// Missing record → `Ok(None)`; this is the first pass on this bench.
    pub fn load(bench: &Path) -> Result<Option<Self>> {
        let path = paths::record_path(bench);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let record: RunRecord = serde_yaml::from_str(&data)?;
        Ok(Some(record))
    }

    pub fn save(&self, bench: &Path) -> Result<()> {
        let path = paths::record_path(bench);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Carry the run counter forward from the previous record, if any.
    pub fn following(mut self, previous: Option<&RunRecord>) -> Self {
        if let Some(prev) = previous {
            self.runs = prev.runs.saturating_add(1);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_record_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(RunRecord::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn save_load_keeps_backup_note() {
        let dir = TempDir::new().unwrap();
        let record = RunRecord::new(
            "hr.example.com",
            Action::CreateFreshSite,
            "fresh-bench-creates",
            BackupStatus::AwaitingData,
        );
        record.save(dir.path()).unwrap();

        let raw = std::fs::read_to_string(paths::record_path(dir.path())).unwrap();
        assert!(raw.contains("status: awaiting_data"));
        assert!(raw.contains("type: create_fresh_site"));

        let loaded = RunRecord::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.last_action, Action::CreateFreshSite);
        assert_eq!(loaded.backup, BackupStatus::AwaitingData);
    }

    #[test]
    fn run_counter_advances() {
        let first = RunRecord::new("s", Action::CreateFreshSite, "r", BackupStatus::AwaitingData);
        let second = RunRecord::new("s", Action::MigrateExistingSite, "r", BackupStatus::AwaitingData)
            .following(Some(&first));
        assert_eq!(second.runs, 2);
    }
}
