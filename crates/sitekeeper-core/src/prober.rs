//! State prober: classify bench, site config and schema without side effects.

use crate::error::Result;
use crate::io;
use crate::paths;
use crate::schema::{self, SchemaInspector};
use crate::site_config;
use crate::target::ProvisioningTarget;
use crate::types::{BenchState, DatabaseSchemaState, ProbedState, SiteConfigState};
use std::path::Path;

pub fn probe(target: &ProvisioningTarget, inspector: &dyn SchemaInspector) -> Result<ProbedState> {
    let state = ProbedState {
        bench: bench_state(&target.bench_dir)?,
        site_config: site_config_state(target, inspector),
        schema: schema_state(target, inspector),
    };
    tracing::info!(
        bench = %state.bench,
        site_config = %state.site_config,
        schema = %state.schema,
        "probed"
    );
    Ok(state)
}

pub fn bench_state(bench_dir: &Path) -> Result<BenchState> {
    let apps = paths::apps_dir(bench_dir);
    if !apps.is_dir() {
        return Ok(BenchState::Absent);
    }
    if io::subdirectories(&apps)?.is_empty() {
        Ok(BenchState::PresentEmpty)
    } else {
        Ok(BenchState::PresentWithApps)
    }
}

/// An unreadable or malformed config counts as orphaned; only a config the
/// bench could actually use is ever reported valid.
pub fn site_config_state(
    target: &ProvisioningTarget,
    inspector: &dyn SchemaInspector,
) -> SiteConfigState {
    let path = paths::site_config(&target.bench_dir, &target.site);
    match site_config::read(&path) {
        Ok(None) => SiteConfigState::Absent,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable site config");
            SiteConfigState::PresentOrphaned
        }
        Ok(Some(_)) if !target.database.is_external() => SiteConfigState::PresentValid,
        Ok(Some(_)) => {
            if schema::marker_present(inspector, &target.database) {
                SiteConfigState::PresentValid
            } else {
                SiteConfigState::PresentOrphaned
            }
        }
    }
}

pub fn schema_state(
    target: &ProvisioningTarget,
    inspector: &dyn SchemaInspector,
) -> DatabaseSchemaState {
    if !target.database.is_external() {
        return DatabaseSchemaState::EmbeddedLocal;
    }
    match schema::inspect(inspector, &target.database) {
        Ok(facts) if !facts.exists => DatabaseSchemaState::ExternalAbsent,
        Ok(facts) if facts.table_count == 0 => DatabaseSchemaState::ExternalEmpty,
        Ok(facts) => DatabaseSchemaState::ExternalPopulated {
            table_count: facts.table_count,
            has_marker: facts.has_marker,
        },
        Err(e) => DatabaseSchemaState::ExternalUnreachable {
            reason: e.to_string(),
        },
    }
}

/// True when the site's file areas hold at least one real file.
pub fn site_has_user_files(target: &ProvisioningTarget) -> Result<bool> {
    let bench = &target.bench_dir;
    Ok(io::contains_any_file(&paths::private_files(bench, &target.site))?
        || io::contains_any_file(&paths::public_files(bench, &target.site))?)
}
