use crate::output::print_json;
use crate::source::Source;
use anyhow::Context;
use sitekeeper_core::config::WarnLevel;
use sitekeeper_core::ProvisionError;

pub fn run(source: &Source, json: bool) -> anyhow::Result<()> {
    let config = source.config().context("failed to load configuration")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "database": config.database_kind(),
            "local_target": config.is_local_target(),
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Configuration is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if let Some(key) = config.placeholder_keys().first() {
        return Err(ProvisionError::PlaceholderCredential {
            key: (*key).to_string(),
        }
        .into());
    }
    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();
    if errors > 0 {
        return Err(ProvisionError::Config(format!(
            "configuration validation found {errors} error(s)"
        ))
        .into());
    }
    Ok(())
}
