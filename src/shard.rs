//! Sharded JSONL reading.
//!
//! A dataset directory holds shard files named `samples.<N>.jsonl`. The
//! reader merges them into one logical record stream: shards are visited in
//! lexicographic filename order (directory listings are not inherently
//! ordered, so the sort is mandatory for reproducibility), and lines within a
//! shard are yielded in file order.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::constants::shard::{SHARD_PREFIX, SHARD_SUFFIX};
use crate::errors::PipelineError;
use crate::storage::BlobStore;
use crate::types::RawRecord;
use std::io::BufRead;
use std::sync::Arc;

/// Reader merging all shard files under a directory into one record stream.
pub struct ShardReader {
    store: Arc<dyn BlobStore>,
}

impl ShardReader {
    /// Create a reader backed by the given storage capability.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Lazily iterate raw records from every shard under `input_path`.
    ///
    /// Remote directories are fully materialized into a local cache before
    /// the first line is read; iteration then runs over the cache. Shard
    /// resolution happens eagerly so layout distribution downstream sees a
    /// stable stream, but no shard is opened until it is reached.
    pub fn iter(&self, input_path: &str) -> Result<ShardRecords, PipelineError> {
        let local_dir = if self.store.is_blob_url(input_path) {
            info!(input_path, "downloading remote shard directory");
            self.store.download_directory_cached(input_path)?
        } else {
            PathBuf::from(input_path)
        };
        let shards = resolve_shards(&local_dir)?;
        debug!(
            dir = %local_dir.display(),
            shards = shards.len(),
            "resolved shard files"
        );
        Ok(ShardRecords {
            store: Arc::clone(&self.store),
            shards: shards.into_iter(),
            current: None,
        })
    }

    /// Local directory iteration will run over for `input_path`.
    ///
    /// For remote inputs this is the cache directory; used by callers that
    /// write derived output next to the shards they read.
    pub fn local_dir(&self, input_path: &str) -> Result<PathBuf, PipelineError> {
        if self.store.is_blob_url(input_path) {
            self.store.download_directory_cached(input_path)
        } else {
            Ok(PathBuf::from(input_path))
        }
    }
}

/// True if `name` matches the `samples.<N>.jsonl` shard naming convention.
fn is_shard_name(name: &str) -> bool {
    name.strip_prefix(SHARD_PREFIX)
        .and_then(|rest| rest.strip_suffix(SHARD_SUFFIX))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

/// Resolve shard files directly under `dir`, sorted lexicographically.
fn resolve_shards(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut shards: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| PipelineError::ShardUnavailable {
            path: dir.display().to_string(),
            reason: format!("failed listing shard directory: {err}"),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .map(is_shard_name)
            .unwrap_or(false);
        if matches {
            shards.push(entry.path().to_path_buf());
        }
    }
    shards.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(shards)
}

/// Lazy record stream over resolved shard files.
pub struct ShardRecords {
    store: Arc<dyn BlobStore>,
    shards: std::vec::IntoIter<PathBuf>,
    current: Option<ShardLines>,
}

struct ShardLines {
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
    line_no: usize,
}

impl ShardRecords {
    fn open_next_shard(&mut self) -> Result<bool, PipelineError> {
        match self.shards.next() {
            Some(path) => {
                debug!(shard = %path.display(), "opening shard");
                let reader = self.store.open(&path)?;
                self.current = Some(ShardLines {
                    path,
                    reader,
                    line_no: 0,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>, PipelineError> {
        loop {
            if self.current.is_none() && !self.open_next_shard()? {
                return Ok(None);
            }
            let Some(shard) = self.current.as_mut() else {
                continue;
            };
            let mut line = String::new();
            let bytes =
                shard
                    .reader
                    .read_line(&mut line)
                    .map_err(|err| PipelineError::ShardUnavailable {
                        path: shard.path.display().to_string(),
                        reason: format!("failed reading line {}: {err}", shard.line_no + 1),
                    })?;
            if bytes == 0 {
                // Shard exhausted; release the handle before moving on.
                self.current = None;
                continue;
            }
            shard.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: RawRecord = serde_json::from_str(trimmed).map_err(|err| {
                PipelineError::MalformedRecord(format!(
                    "shard {} line {}: {err}",
                    shard.path.display(),
                    shard.line_no
                ))
            })?;
            return Ok(Some(record));
        }
    }
}

impl Iterator for ShardRecords {
    type Item = Result<RawRecord, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
