pub mod backup;
pub mod config;
pub mod configurator;
pub mod control_plane;
pub mod decision;
pub mod env_file;
pub mod error;
pub mod executor;
pub mod io;
pub mod jobs;
pub mod paths;
pub mod prober;
pub mod reconciler;
pub mod record;
pub mod retry;
pub mod runner;
pub mod schema;
pub mod secret_payload;
pub mod site_config;
pub mod target;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ProvisionError, Result};
