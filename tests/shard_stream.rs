use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use comparisons::{
    distribute, BlobStore, Layout, LocalStore, PipelineError, RawRecord, ShardReader,
};

fn write_shard(dir: &Path, name: &str, indices: &[i64]) {
    let lines: String = indices
        .iter()
        .map(|idx| format!("{}\n", json!({ "idx": idx })))
        .collect();
    fs::write(dir.join(name), lines).unwrap();
}

fn read_indices(records: impl Iterator<Item = Result<RawRecord, PipelineError>>) -> Vec<i64> {
    records
        .map(|record| record.unwrap()["idx"].as_i64().unwrap())
        .collect()
}

#[test]
fn records_arrive_in_shard_then_line_order() {
    let temp = tempfile::tempdir().unwrap();
    write_shard(temp.path(), "samples.0.jsonl", &[0, 1, 2]);
    write_shard(temp.path(), "samples.1.jsonl", &[3, 4]);

    let reader = ShardReader::new(Arc::new(LocalStore));
    let indices = read_indices(reader.iter(temp.path().to_str().unwrap()).unwrap());
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[test]
fn discovery_ignores_non_shard_files_and_subdirectories() {
    let temp = tempfile::tempdir().unwrap();
    write_shard(temp.path(), "samples.0.jsonl", &[0]);
    fs::write(temp.path().join("samples.txt"), "not a shard\n").unwrap();
    fs::write(temp.path().join("checkpoint.jsonl"), "{}\n").unwrap();
    let nested = temp.path().join("nested");
    fs::create_dir(&nested).unwrap();
    write_shard(&nested, "samples.1.jsonl", &[99]);

    let reader = ShardReader::new(Arc::new(LocalStore));
    let indices = read_indices(reader.iter(temp.path().to_str().unwrap()).unwrap());
    assert_eq!(indices, vec![0]);
}

#[test]
fn distribution_over_shards_partitions_the_stream() {
    let temp = tempfile::tempdir().unwrap();
    write_shard(temp.path(), "samples.0.jsonl", &[0, 1, 2, 3]);
    write_shard(temp.path(), "samples.1.jsonl", &[4, 5, 6]);
    write_shard(temp.path(), "samples.2.jsonl", &[7, 8]);

    let reader = ShardReader::new(Arc::new(LocalStore));
    let num_replicas = 2;
    let mut merged = Vec::new();
    for replica in 0..num_replicas {
        let layout = Layout::new(replica, num_replicas).unwrap();
        let records = reader.iter(temp.path().to_str().unwrap()).unwrap();
        merged.push(read_indices(distribute(records, layout)));
    }
    assert_eq!(merged[0], vec![0, 2, 4, 6, 8]);
    assert_eq!(merged[1], vec![1, 3, 5, 7]);
}

/// Fake remote store: `blob://` URLs resolve to a prepared local directory.
struct FakeRemoteStore {
    cache_dir: PathBuf,
    downloads: AtomicUsize,
}

impl BlobStore for FakeRemoteStore {
    fn is_blob_url(&self, path: &str) -> bool {
        path.starts_with("blob://")
    }

    fn download_directory_cached(&self, _url: &str) -> Result<PathBuf, PipelineError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(self.cache_dir.clone())
    }

    fn open(&self, path: &Path) -> Result<Box<dyn BufRead + Send>, PipelineError> {
        LocalStore.open(path)
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>, PipelineError> {
        LocalStore.create(path)
    }
}

#[test]
fn remote_directories_are_materialized_before_iteration() {
    let temp = tempfile::tempdir().unwrap();
    write_shard(temp.path(), "samples.0.jsonl", &[10, 11]);

    let store = Arc::new(FakeRemoteStore {
        cache_dir: temp.path().to_path_buf(),
        downloads: AtomicUsize::new(0),
    });
    let reader = ShardReader::new(store.clone());
    let indices = read_indices(reader.iter("blob://bucket/comparisons").unwrap());
    assert_eq!(indices, vec![10, 11]);
    assert_eq!(store.downloads.load(Ordering::SeqCst), 1);
}

#[test]
fn local_paths_bypass_the_download_step() {
    let temp = tempfile::tempdir().unwrap();
    write_shard(temp.path(), "samples.0.jsonl", &[1]);

    let store = Arc::new(FakeRemoteStore {
        cache_dir: PathBuf::from("/unused"),
        downloads: AtomicUsize::new(0),
    });
    let reader = ShardReader::new(store.clone());
    let indices = read_indices(reader.iter(temp.path().to_str().unwrap()).unwrap());
    assert_eq!(indices, vec![1]);
    assert_eq!(store.downloads.load(Ordering::SeqCst), 0);
}

#[test]
fn stream_errors_surface_on_every_replica() {
    let temp = tempfile::tempdir().unwrap();
    write_shard(temp.path(), "samples.0.jsonl", &[0, 1]);
    fs::write(temp.path().join("samples.1.jsonl"), "broken\n").unwrap();

    let num_replicas = 2;
    for replica in 0..num_replicas {
        let layout = Layout::new(replica, num_replicas).unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(LocalStore);
        let results: Vec<Result<RawRecord, PipelineError>> =
            comparisons::record_stream(store, temp.path().to_str().unwrap(), Some(layout))
                .unwrap()
                .collect();
        // Each replica keeps its own record but both must see the error.
        assert_eq!(
            results.iter().filter(|result| result.is_ok()).count(),
            1,
            "replica {replica} record count"
        );
        assert!(
            results
                .iter()
                .any(|result| matches!(result, Err(PipelineError::MalformedRecord(_)))),
            "replica {replica} missed the fatal error"
        );
    }
}

#[test]
fn unreadable_mid_stream_shard_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    write_shard(temp.path(), "samples.0.jsonl", &[0]);
    fs::write(temp.path().join("samples.1.jsonl"), "{\"idx\": 1}\nbroken\n").unwrap();

    let reader = ShardReader::new(Arc::new(LocalStore));
    let mut records = reader.iter(temp.path().to_str().unwrap()).unwrap();
    assert_eq!(records.next().unwrap().unwrap()["idx"], json!(0));
    assert_eq!(records.next().unwrap().unwrap()["idx"], json!(1));
    assert!(records.next().unwrap().is_err());
}
