use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur while configuring the chunker or reading input.
///
/// Malformed source text is never an error: it degrades to line-window
/// chunking and is reported as a [`Degradation`] instead.
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be deserialized
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ChunkerError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a config parse error
    pub fn config_parse(msg: impl ToString) -> Self {
        Self::ConfigParse(msg.to_string())
    }
}

/// A recovered condition met while chunking one file.
///
/// Degradations never abort chunking; they explain why part of a file was
/// split by line windows instead of by structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// A string or char literal was still open at end of line or file
    UnterminatedLiteral { offset: usize },
    /// A block comment was still open at end of file
    UnterminatedComment { offset: usize },
    /// A closing brace without an opener, or an opener never closed
    UnbalancedBraces { offset: usize },
    /// A single unsplittable unit exceeds the size budget
    OversizedAtomicUnit { start: usize, end: usize },
    /// No profile matched the file; the default profile was applied
    UnknownLanguage { file: String },
}

impl Degradation {
    /// Byte offset the degradation starts at, if it refers to a position.
    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        match self {
            Self::UnterminatedLiteral { offset }
            | Self::UnterminatedComment { offset }
            | Self::UnbalancedBraces { offset } => Some(*offset),
            Self::OversizedAtomicUnit { start, .. } => Some(*start),
            Self::UnknownLanguage { .. } => None,
        }
    }
}
