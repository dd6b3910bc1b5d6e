use thiserror::Error;

/// Process exit codes. `0` is success; everything not listed maps to `1`.
pub mod exit_code {
    pub const GUARD_REFUSAL: i32 = 2;
    pub const COMMAND_FAILED: i32 = 3;
    pub const CONFIG_INVALID: i32 = 4;
    pub const AMBIGUOUS_STATE: i32 = 5;
    pub const OTHER: i32 = 1;
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("placeholder value detected for {key}; set a real credential for non-local targets")]
    PlaceholderCredential { key: String },

    #[error(
        "refusing to initialize site: bench has no record of schema '{schema}' but it already \
         holds {table_count} tables (set ALLOW_NON_EMPTY_SCHEMA=true to override)"
    )]
    GuardRefusal { schema: String, table_count: u64 },

    #[error("could not classify database state: {0}")]
    AmbiguousState(String),

    #[error("command `{command}` failed ({status}):\n{output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("required tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("failed to spawn `{command}`: {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("invalid secret payload: {0}")]
    SecretPayload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::GuardRefusal { .. } => exit_code::GUARD_REFUSAL,
            ProvisionError::CommandFailed { .. }
            | ProvisionError::ToolNotFound(_)
            | ProvisionError::SpawnFailed { .. } => exit_code::COMMAND_FAILED,
            ProvisionError::Config(_) | ProvisionError::PlaceholderCredential { .. } => {
                exit_code::CONFIG_INVALID
            }
            ProvisionError::AmbiguousState(_) => exit_code::AMBIGUOUS_STATE,
            _ => exit_code::OTHER,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
