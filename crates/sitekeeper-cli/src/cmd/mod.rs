pub mod plan;
pub mod probe;
pub mod reconcile;
pub mod render_env;
pub mod validate;
