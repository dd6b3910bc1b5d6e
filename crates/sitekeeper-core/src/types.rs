use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// BenchState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchState {
    Absent,
    PresentEmpty,
    PresentWithApps,
}

impl BenchState {
    pub fn all() -> &'static [BenchState] {
        &[
            BenchState::Absent,
            BenchState::PresentEmpty,
            BenchState::PresentWithApps,
        ]
    }

    /// A bench with no installed apps knows nothing about any existing schema.
    pub fn is_fresh(self) -> bool {
        !matches!(self, BenchState::PresentWithApps)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BenchState::Absent => "absent",
            BenchState::PresentEmpty => "present_empty",
            BenchState::PresentWithApps => "present_with_apps",
        }
    }
}

impl fmt::Display for BenchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SiteConfigState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteConfigState {
    Absent,
    PresentValid,
    /// Config file exists but its external schema lacks the marker table.
    PresentOrphaned,
}

impl SiteConfigState {
    pub fn all() -> &'static [SiteConfigState] {
        &[
            SiteConfigState::Absent,
            SiteConfigState::PresentValid,
            SiteConfigState::PresentOrphaned,
        ]
    }

    pub fn is_valid(self) -> bool {
        matches!(self, SiteConfigState::PresentValid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SiteConfigState::Absent => "absent",
            SiteConfigState::PresentValid => "present_valid",
            SiteConfigState::PresentOrphaned => "present_orphaned",
        }
    }
}

impl fmt::Display for SiteConfigState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DatabaseSchemaState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatabaseSchemaState {
    EmbeddedLocal,
    ExternalAbsent,
    ExternalEmpty,
    ExternalPopulated { table_count: u64, has_marker: bool },
    /// The external server could not be queried; nothing is known.
    ExternalUnreachable { reason: String },
}

impl DatabaseSchemaState {
    pub fn is_populated(&self) -> bool {
        matches!(self, DatabaseSchemaState::ExternalPopulated { table_count, .. } if *table_count > 0)
    }

    pub fn has_marker(&self) -> bool {
        matches!(
            self,
            DatabaseSchemaState::ExternalPopulated {
                has_marker: true,
                ..
            }
        )
    }

    pub fn table_count(&self) -> u64 {
        match self {
            DatabaseSchemaState::ExternalPopulated { table_count, .. } => *table_count,
            _ => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseSchemaState::EmbeddedLocal => "embedded_local",
            DatabaseSchemaState::ExternalAbsent => "external_absent",
            DatabaseSchemaState::ExternalEmpty => "external_empty",
            DatabaseSchemaState::ExternalPopulated { .. } => "external_populated",
            DatabaseSchemaState::ExternalUnreachable { .. } => "external_unreachable",
        }
    }
}

impl fmt::Display for DatabaseSchemaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseSchemaState::ExternalPopulated {
                table_count,
                has_marker,
            } => write!(
                f,
                "external_populated({table_count} tables, marker {})",
                if *has_marker { "present" } else { "absent" }
            ),
            DatabaseSchemaState::ExternalUnreachable { reason } => {
                write!(f, "external_unreachable({reason})")
            }
            other => f.write_str(other.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// ProbedState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbedState {
    pub bench: BenchState,
    pub site_config: SiteConfigState,
    pub schema: DatabaseSchemaState,
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CreateFreshSite,
    /// Write config only, skip schema init, then migrate.
    AdoptExistingExternalSchema,
    MigrateExistingSite,
    /// Fatal; nothing is mutated.
    RefuseNonEmptyForeignSchema { table_count: u64 },
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::CreateFreshSite => "create_fresh_site",
            Action::AdoptExistingExternalSchema => "adopt_existing_external_schema",
            Action::MigrateExistingSite => "migrate_existing_site",
            Action::RefuseNonEmptyForeignSchema { .. } => "refuse_non_empty_foreign_schema",
        }
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, Action::RefuseNonEmptyForeignSchema { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
