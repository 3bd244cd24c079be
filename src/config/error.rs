use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which of the two documents a `ConfigLoader` manages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Document {
    Config,
    Schema,
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Document::Config => f.write_str("configuration"),
            Document::Schema => f.write_str("schema"),
        }
    }
}

/// Load-time failures raised by `ConfigLoader`.
///
/// `ModeDial` catches and logs all of these during construction; they only
/// propagate to callers that use the loader directly.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not exist.
    #[error("{kind} file not found: {}", path.display())]
    NotFound { kind: Document, path: PathBuf },

    /// The file exists but could not be read.
    #[error("failed to read {kind} file {}: {source}", path.display())]
    Io {
        kind: Document,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content is not valid JSON, or not a JSON object where one is required.
    #[error("invalid {kind} JSON in {origin}: {message}")]
    Parse {
        kind: Document,
        origin: String,
        message: String,
    },

    /// The configuration violates the schema or the mode model's constraints.
    #[error("configuration failed validation: {0}")]
    Validation(String),

    /// The schema document itself cannot be compiled.
    #[error("invalid JSON Schema: {0}")]
    InvalidSchema(String),

    /// `validate_config` was called before both documents were loaded.
    #[error("{0} has not been loaded")]
    NotLoaded(Document),
}

impl ConfigError {
    /// True for the "file does not exist" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }
}
