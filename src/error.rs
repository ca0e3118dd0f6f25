//! Error kinds shared by the index search engine and its loaders.

use thiserror::Error;

use crate::chemistry::Chemistry;

/// Errors raised while validating inputs or searching for a design
#[derive(Error, Debug)]
pub enum DesignError {
    /// Parameters or index pools that can never yield a design
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Too few indexes survive chemistry filtering to fill the requested lanes
    #[error(
        "Only {available} indexes are usable with {chemistry} chemistry, {required} are required"
    )]
    IncompatiblePoolTooSmall {
        chemistry: Chemistry,
        available: usize,
        required: usize,
    },

    /// The trial budget ran out before a valid design was assembled
    #[error("No solution found after {trials} trials")]
    NoSolutionFound { trials: usize },

    /// Malformed row in an index table
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DesignError>;

impl DesignError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Whether the caller may retry with a larger budget or relaxed options
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoSolutionFound { .. })
    }
}
