use thiserror::Error;

use crate::core_types::Role;

/// Line-level grammar violation in a wire-format instance.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct WireError {
    pub line: usize,
    pub reason: String,
}

impl WireError {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Infrastructure failures. Findings (mismatch, timeout, undecodable output)
/// are not errors; they are carried by `RoundOutcome`.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to launch {role} executable '{program}': {source}")]
    Launch {
        role: Role,
        program: String,
        #[source]
        source: std::io::Error,
    },
}
