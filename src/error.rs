use std::path::PathBuf;

use thiserror::Error;

use crate::model::FormatVariant;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("parse error: {reason}")]
    Parse { reason: String },

    #[error("missing required {format} fields: {}", fields.join(", "))]
    FieldMissing {
        format: FormatVariant,
        fields: Vec<String>,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimilarityError {
    #[error("similarity provider unavailable: {0}")]
    Unavailable(String),

    #[error("similarity computation exceeded {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("similarity backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("definition file missing: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read definition file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed definition file {}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid definitions in {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}
