//! Blob storage capability boundary.
//!
//! The remote backend (bucket layout, auth, caching policy) is outside this
//! crate; shard reading only needs to recognize remote URLs, materialize a
//! remote directory into a local cache, and open streams by path.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::PipelineError;

/// Opaque storage capability used by shard reading and normalized output.
pub trait BlobStore: Send + Sync {
    /// True when `path` names a remote blob location rather than a local path.
    fn is_blob_url(&self, path: &str) -> bool;
    /// Fully materialize a remote directory into a local cache directory.
    ///
    /// Blocking and synchronous; returns the cache path once every file is
    /// present locally. Repeated calls for the same URL may reuse the cache.
    fn download_directory_cached(&self, url: &str) -> Result<PathBuf, PipelineError>;
    /// Open a local path for buffered reading.
    fn open(&self, path: &Path) -> Result<Box<dyn BufRead + Send>, PipelineError>;
    /// Open a local path for buffered writing, truncating any existing file.
    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>, PipelineError>;
}

/// Filesystem-only `BlobStore` for local runs and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStore;

impl BlobStore for LocalStore {
    fn is_blob_url(&self, _path: &str) -> bool {
        false
    }

    fn download_directory_cached(&self, url: &str) -> Result<PathBuf, PipelineError> {
        Err(PipelineError::Storage(format!(
            "local store cannot download remote directory '{url}'"
        )))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn BufRead + Send>, PipelineError> {
        let file = File::open(path).map_err(|err| PipelineError::ShardUnavailable {
            path: path.display().to_string(),
            reason: format!("failed opening for read: {err}"),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>, PipelineError> {
        let file = File::create(path).map_err(|err| PipelineError::ShardUnavailable {
            path: path.display().to_string(),
            reason: format!("failed opening for write: {err}"),
        })?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
