use anyhow::Context;
use sitekeeper_core::config::{ProvisionConfig, CONFIG_KEYS};
use sitekeeper_core::decision::Policy;
use sitekeeper_core::env_file::{self, EnvMap};
use sitekeeper_core::target::ProvisioningTarget;
use std::path::PathBuf;

/// Where the configuration comes from: the global CLI flags.
pub struct Source {
    pub env_file: Option<PathBuf>,
    pub bench_dir: Option<PathBuf>,
}

/// Executables the run shells out to; taken out of the config before it is
/// turned into an immutable target.
pub struct Tools {
    pub bench: String,
    pub mysql: String,
}

impl Source {
    /// Merge in increasing precedence: env file, process environment, `--bench-dir`.
    pub fn env_map(&self) -> anyhow::Result<EnvMap> {
        let mut map = match &self.env_file {
            Some(path) => env_file::load(path)
                .with_context(|| format!("failed to read env file {}", path.display()))?,
            None => EnvMap::new(),
        };
        overlay(&mut map, std::env::vars());
        if let Some(dir) = &self.bench_dir {
            map.insert("BENCH_DIR".to_string(), dir.to_string_lossy().into_owned());
        }
        Ok(map)
    }

    pub fn config(&self) -> anyhow::Result<ProvisionConfig> {
        let map = self.env_map()?;
        Ok(ProvisionConfig::from_env(&map)?)
    }

    pub fn target(&self) -> anyhow::Result<(ProvisioningTarget, Policy, Tools)> {
        let config = self.config()?;
        let tools = Tools {
            bench: config.bench_bin.clone(),
            mysql: config.mysql_bin.clone(),
        };
        let (target, policy) = config.into_target()?;
        Ok((target, policy, tools))
    }
}

fn overlay(map: &mut EnvMap, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        if CONFIG_KEYS.contains(&key.as_str()) {
            map.insert(key, value);
        }
    }
}
