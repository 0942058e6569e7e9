use std::io;

use thiserror::Error;

/// Error type for layout, encoding, shard IO, and collation failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid layout: replica_index {replica_index} out of range for {num_replicas} replicas")]
    InvalidLayout {
        replica_index: usize,
        num_replicas: usize,
    },
    #[error("response of {actual} tokens exceeds max length {max_len} and truncation is disallowed")]
    ResponseTooLong { actual: usize, max_len: usize },
    #[error("template references missing record field '{field}'")]
    MissingTemplateField { field: String },
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("shard '{path}' unavailable: {reason}")]
    ShardUnavailable { path: String, reason: String },
    #[error("storage backend failure: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
