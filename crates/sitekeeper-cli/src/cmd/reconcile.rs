use crate::output::{print_json, print_notes};
use crate::source::Source;
use anyhow::Context;
use sitekeeper_core::control_plane::BenchCli;
use sitekeeper_core::jobs::CrontabStore;
use sitekeeper_core::reconciler::{self, Collaborators, ReconcileReport};
use sitekeeper_core::retry::RetryPolicy;
use sitekeeper_core::runner::SystemRunner;
use sitekeeper_core::schema::MysqlCli;
use std::process::Command;

pub fn run(source: &Source, dry_run: bool, then: &[String], json: bool) -> anyhow::Result<()> {
    let (target, policy, tools) = source.target()?;
    let runner = SystemRunner;
    let control = BenchCli::new(&tools.bench, &target.bench_dir, &runner, RetryPolicy::default());
    let inspector = MysqlCli::new(&tools.mysql, &runner);
    let jobs = CrontabStore::new(&runner);
    let collaborators = Collaborators {
        control: &control,
        inspector: &inspector,
        jobs: &jobs,
    };

    let report = reconciler::reconcile(&target, policy, &collaborators, dry_run)?;
    if json {
        print_json(&report)?;
    } else {
        print_summary(&report);
    }

    if dry_run || then.is_empty() {
        return Ok(());
    }
    hand_off(then)
}

fn print_summary(report: &ReconcileReport) {
    let prefix = if report.dry_run { "would run" } else { "ran" };
    println!(
        "{}: {prefix} {} (rule {})",
        report.site, report.decision.action, report.decision.rule
    );
    print_notes(&report.decision.notes);
    if let Some(execution) = &report.execution {
        for step in &execution.steps {
            println!("  step: {step}");
        }
    }
    if let Some(configuration) = &report.configuration {
        if !configuration.applied.is_empty() {
            println!("  settings updated: {}", configuration.applied.join(", "));
        }
    }
    if let Some(backup) = &report.backup {
        println!("  backup: {}", backup.as_str());
    }
}

/// Replace this process with the long-running application command.
#[cfg(unix)]
fn hand_off(then: &[String]) -> anyhow::Result<()> {
    use std::os::unix::process::CommandExt;
    tracing::info!(command = %then.join(" "), "handing off");
    let err = Command::new(&then[0]).args(&then[1..]).exec();
    Err(err).with_context(|| format!("failed to exec `{}`", then[0]))
}

#[cfg(not(unix))]
fn hand_off(then: &[String]) -> anyhow::Result<()> {
    tracing::info!(command = %then.join(" "), "handing off");
    let status = Command::new(&then[0])
        .args(&then[1..])
        .status()
        .with_context(|| format!("failed to start `{}`", then[0]))?;
    std::process::exit(status.code().unwrap_or(1));
}
