use crate::output::{print_json, print_table};
use crate::source::Source;
use sitekeeper_core::prober;
use sitekeeper_core::runner::SystemRunner;
use sitekeeper_core::schema::MysqlCli;

pub fn run(source: &Source, json: bool) -> anyhow::Result<()> {
    let (target, _policy, tools) = source.target()?;
    let runner = SystemRunner;
    let inspector = MysqlCli::new(&tools.mysql, &runner);
    let state = prober::probe(&target, &inspector)?;

    if json {
        return print_json(&state);
    }
    print_table(
        &["COMPONENT", "STATE"],
        vec![
            vec!["bench".to_string(), state.bench.to_string()],
            vec!["site_config".to_string(), state.site_config.to_string()],
            vec!["schema".to_string(), state.schema.to_string()],
        ],
    );
    Ok(())
}
