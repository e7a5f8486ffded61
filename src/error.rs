use thiserror::Error;

use crate::state_machine::JobState;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No file names can be generated: enable auto numbering or FASTA descriptions")]
    NamingDisabled,

    #[error("Records {first} and {second} would both be saved as `{name}`: enable auto numbering")]
    DuplicateName {
        first: usize,
        second: usize,
        name: String,
    },

    #[error("Record {ordinal} has no usable file name (`{name}`): enable auto numbering")]
    UnusableName { ordinal: usize, name: String },

    #[error("Invalid record window: end {end} is before start {start}")]
    InvalidWindow { start: usize, end: usize },

    #[error("Failed to launch job {ordinal}: {source}")]
    Launch {
        ordinal: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Illegal job transition for job {ordinal}: {from} -> {to}")]
    IllegalTransition {
        ordinal: usize,
        from: JobState,
        to: JobState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
