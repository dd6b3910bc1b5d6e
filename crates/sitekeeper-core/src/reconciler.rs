//! One provisioning pass: probe → decide → execute → configure → backup → record.

use crate::backup::{self, BackupStatus};
use crate::configurator::{self, ConfigureReport};
use crate::control_plane::ApplicationControlPlane;
use crate::decision::{self, Decision, Policy};
use crate::error::Result;
use crate::executor::{ExecutionReport, Executor};
use crate::jobs::JobStore;
use crate::prober;
use crate::record::RunRecord;
use crate::schema::SchemaInspector;
use crate::target::ProvisioningTarget;
use crate::types::ProbedState;
use serde::Serialize;

/// The external systems a pass talks to.
pub struct Collaborators<'a> {
    pub control: &'a dyn ApplicationControlPlane,
    pub inspector: &'a dyn SchemaInspector,
    pub jobs: &'a dyn JobStore,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub state: ProbedState,
    pub decision: Decision,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub site: String,
    pub state: ProbedState,
    pub decision: Decision,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<ConfigureReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupStatus>,
}

/// Probe and decide without touching anything.
pub fn plan(
    target: &ProvisioningTarget,
    policy: Policy,
    inspector: &dyn SchemaInspector,
) -> Result<Plan> {
    let state = prober::probe(target, inspector)?;
    let decision = decision::decide(&state, policy)?;
    for note in &decision.notes {
        tracing::warn!("{note}");
    }
    tracing::info!(action = %decision.action, rule = %decision.rule, "decided");
    Ok(Plan { state, decision })
}

pub fn reconcile(
    target: &ProvisioningTarget,
    policy: Policy,
    collaborators: &Collaborators<'_>,
    dry_run: bool,
) -> Result<ReconcileReport> {
    let Plan { state, decision } = plan(target, policy, collaborators.inspector)?;
    let mut report = ReconcileReport {
        site: target.site.clone(),
        state,
        decision,
        dry_run,
        execution: None,
        configuration: None,
        backup: None,
    };
    if dry_run {
        return Ok(report);
    }

    let previous = match RunRecord::load(&target.bench_dir) {
        Ok(previous) => previous,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable run record; starting a fresh one");
            None
        }
    };
    if let Some(prev) = &previous {
        if prev.backup == BackupStatus::AwaitingData {
            tracing::info!("previous run deferred backup registration; checking for data again");
        }
    }

    let executor = Executor {
        target,
        policy,
        control: collaborators.control,
        inspector: collaborators.inspector,
    };
    let execution = executor.execute(report.state.bench, report.decision.action)?;
    report.execution = Some(execution);

    report.configuration = Some(configurator::configure(target, collaborators.control)?);

    let backup = backup::reconcile(target, collaborators.jobs)?;
    report.backup = Some(backup.clone());

    RunRecord::new(
        &target.site,
        report.decision.action,
        &report.decision.rule,
        backup,
    )
    .following(previous.as_ref())
    .save(&target.bench_dir)?;

    tracing::info!(site = %target.site, action = %report.decision.action, "reconcile complete");
    Ok(report)
}
