//! Post-provision configurator.
//!
//! Every value is compared against the site's current config first and only
//! written through the control plane when it differs, so a re-run of an
//! already configured site issues no `set_config` at all.

use crate::control_plane::ApplicationControlPlane;
use crate::error::Result;
use crate::paths;
use crate::site_config;
use crate::target::ProvisioningTarget;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigureReport {
    pub applied: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Desired site-level settings, in the order they are applied.
pub fn desired_settings(target: &ProvisioningTarget) -> Vec<(&'static str, Value)> {
    let mut settings = vec![
        ("host_name", json!(target.public_url)),
        ("developer_mode", json!(0)),
        ("maintenance_mode", json!(0)),
        ("pause_scheduler", json!(0)),
    ];
    if let Some(storage) = &target.object_storage {
        settings.push(("s3_bucket", json!(storage.bucket)));
        if let Some(endpoint) = &storage.endpoint {
            settings.push(("s3_endpoint_url", json!(endpoint)));
        }
        if let Some(region) = &storage.region {
            settings.push(("s3_region", json!(region)));
        }
        settings.push(("s3_access_key_id", json!(storage.access_key_id)));
        settings.push((
            "s3_secret_access_key",
            json!(storage.secret_access_key.expose()),
        ));
    }
    settings
}

pub fn configure(
    target: &ProvisioningTarget,
    control: &dyn ApplicationControlPlane,
) -> Result<ConfigureReport> {
    let path = paths::site_config(&target.bench_dir, &target.site);
    let current = site_config::read(&path)?.unwrap_or_default();
    let mut report = ConfigureReport::default();

    for (key, value) in desired_settings(target) {
        if site_config::same_value(current.get(key), &value) {
            report.unchanged.push(key.to_string());
            continue;
        }
        control.set_config(&target.site, key, &value)?;
        tracing::info!(site = %target.site, key, "site setting updated");
        report.applied.push(key.to_string());
    }

    control.enable_scheduler(&target.site)?;
    control.clear_cache(&target.site)?;
    Ok(report)
}
