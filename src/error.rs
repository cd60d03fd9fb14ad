use thiserror::Error;

use crate::core::classfile::DecodeError;

/// Main error type for RouteLens operations
#[derive(Error, Debug)]
pub enum RouteLensError {
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Malformed class file {class}: {source}")]
    ClassFormat {
        class: String,
        #[source]
        source: DecodeError,
    },

    #[error("Route pattern is not a constant: {verb} call at offset {offset} in {owner}.{method}")]
    PatternNotFound {
        owner: String,
        method: String,
        verb: String,
        offset: u32,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),
}

pub type Result<T> = std::result::Result<T, RouteLensError>;
