//! Error kinds for the ingestion pipeline.
//!
//! File-level failures (`LoadError`) abort the file they belong to and reach
//! the caller wrapped in a `FileError` that names the path. Record- and
//! chunk-level failures never propagate: they become a `SkipReason` or a
//! rolled-back count on the run report.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a store collaborator (Postgres or in-memory).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("rejected by store: {0}")]
    Rejected(String),
}

/// Fatal for the file being loaded; no partial processing follows.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("no entity signature matches record fields [{}]", fields.join(", "))]
    UnroutableSchema { fields: Vec<String> },

    #[error("payload has no records")]
    EmptyPayload,

    #[error("schema `{schema}` is not reachable")]
    SchemaUnreachable {
        schema: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to read file")]
    Read(#[from] std::io::Error),
}

/// A file-level error together with the file it came from.
#[derive(Debug, Error)]
#[error("error processing {}", path.display())]
pub struct FileError {
    pub path: PathBuf,
    #[source]
    pub source: LoadError,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, source: LoadError) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    /// An empty `content` array is a no-op for the caller, not a failure.
    pub fn is_empty_payload(&self) -> bool {
        matches!(self.source, LoadError::EmptyPayload)
    }
}

/// Why a single record did not make it into the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Normalization produced nothing (not an object, empty, or keyless).
    Unnormalizable,
    UpsertFailed(String),
    /// Per-record transaction could not be committed.
    CommitFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unnormalizable => f.write_str("record could not be normalized"),
            SkipReason::UpsertFailed(e) => write!(f, "upsert failed: {e}"),
            SkipReason::CommitFailed(e) => write!(f, "commit failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_file_error_carries_path_and_cause() {
        let err = FileError::new(
            "data/bairros.json",
            LoadError::InvalidFormat("expected object with 'content' array".into()),
        );
        assert_eq!(err.to_string(), "error processing data/bairros.json");
        let cause = err.source().map(|c| c.to_string()).unwrap_or_default();
        assert!(cause.contains("'content' array"));
    }

    #[test]
    fn test_empty_payload_is_flagged() {
        assert!(FileError::new("a.json", LoadError::EmptyPayload).is_empty_payload());
        assert!(!FileError::new("a.json", LoadError::InvalidFormat("x".into())).is_empty_payload());
    }

    #[test]
    fn test_unroutable_lists_fields() {
        let err = LoadError::UnroutableSchema {
            fields: vec!["foo".into(), "bar".into()],
        };
        assert_eq!(
            err.to_string(),
            "no entity signature matches record fields [foo, bar]"
        );
    }
}
