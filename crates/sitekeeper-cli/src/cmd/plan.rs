use crate::output::{print_json, print_notes};
use crate::source::Source;
use sitekeeper_core::reconciler;
use sitekeeper_core::runner::SystemRunner;
use sitekeeper_core::schema::MysqlCli;
use sitekeeper_core::types::Action;
use sitekeeper_core::ProvisionError;

/// Probe and decide; a refusal is reported with the guard's exit code so a
/// deploy pipeline can stop before anything runs.
pub fn run(source: &Source, json: bool) -> anyhow::Result<()> {
    let (target, policy, tools) = source.target()?;
    let runner = SystemRunner;
    let inspector = MysqlCli::new(&tools.mysql, &runner);
    let plan = reconciler::plan(&target, policy, &inspector)?;

    if json {
        print_json(&plan)?;
    } else {
        println!("site:     {}", target.site);
        println!("bench:    {}", plan.state.bench);
        println!("config:   {}", plan.state.site_config);
        println!("schema:   {}", plan.state.schema);
        println!("action:   {}", plan.decision.action);
        println!("rule:     {}", plan.decision.rule);
        print_notes(&plan.decision.notes);
    }

    if let Action::RefuseNonEmptyForeignSchema { table_count } = plan.decision.action {
        return Err(ProvisionError::GuardRefusal {
            schema: target.database.display_name().to_string(),
            table_count,
        }
        .into());
    }
    Ok(())
}
