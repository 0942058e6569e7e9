use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use comparisons::{
    iter_for_task, Batch, BatchPrefetcher, BlobStore, CharTokenizer, LocalStore, PipelineError,
    QueryHparams, ResponseHparams, TaskHparams, TaskIterOptions, TruncationSide,
};

fn task() -> TaskHparams {
    TaskHparams {
        query: QueryHparams {
            dataset: "tldr".into(),
            format_str: "{post} TL;DR:".into(),
            max_len: 16,
            pad_token: 0,
            truncation_side: TruncationSide::Front,
        },
        response: ResponseHparams {
            ref_format_str: " {summary}".into(),
            max_len: 6,
            pad_token: 0,
        },
    }
}

fn write_shards(dir: &Path, records: usize) {
    let lines: String = (0..records)
        .map(|idx| {
            format!(
                "{}\n",
                json!({ "post": format!("post {idx}"), "summary": format!("s{idx}") })
            )
        })
        .collect();
    fs::write(dir.join("samples.0.jsonl"), lines).unwrap();
}

fn collect_batches(num_workers: usize, dir: &Path) -> Vec<Batch> {
    let store: Arc<dyn BlobStore> = Arc::new(LocalStore);
    iter_for_task(
        &task(),
        Arc::new(CharTokenizer),
        store,
        dir.to_str().unwrap(),
        TaskIterOptions {
            batch_size: 2,
            num_workers,
            ..TaskIterOptions::default()
        },
    )
    .unwrap()
    .map(Result::unwrap)
    .collect()
}

#[test]
fn prefetched_batches_match_the_synchronous_path() {
    let temp = tempfile::tempdir().unwrap();
    write_shards(temp.path(), 7);

    let synchronous = collect_batches(0, temp.path());
    let prefetched = collect_batches(1, temp.path());

    // drop_last: 7 records at batch_size 2 -> 3 batches either way.
    assert_eq!(synchronous.len(), 3);
    assert_eq!(prefetched, synchronous);
}

#[test]
fn prefetcher_stages_at_most_one_batch_ahead() {
    let upstream: Vec<Result<u32, PipelineError>> = (0..16).map(Ok).collect();
    let prefetcher = BatchPrefetcher::spawn(upstream);

    let start = Instant::now();
    while prefetcher.produced_count() < 2 {
        if start.elapsed() > Duration::from_millis(500) {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    // One item in the channel slot; the worker may hold one more in flight.
    assert!(prefetcher.queue_len() <= 1);

    let drained: Vec<u32> = prefetcher.map(Result::unwrap).collect();
    assert_eq!(drained, (0..16).collect::<Vec<u32>>());
}

#[test]
fn prefetcher_propagates_upstream_errors_in_order() {
    let upstream: Vec<Result<u32, PipelineError>> = vec![
        Ok(1),
        Err(PipelineError::MalformedRecord("bad line".into())),
        Ok(2),
    ];
    let mut prefetcher = BatchPrefetcher::spawn(upstream);
    assert_eq!(prefetcher.next().unwrap().unwrap(), 1);
    assert!(prefetcher.next().unwrap().is_err());
    assert_eq!(prefetcher.next().unwrap().unwrap(), 2);
    assert!(prefetcher.next().is_none());
    assert_eq!(prefetcher.error_count(), 1);
}

#[test]
fn dropping_the_prefetcher_stops_the_worker() {
    let upstream = (0..1_000_000u32).map(Ok);
    let prefetcher = BatchPrefetcher::spawn(upstream);
    std::thread::sleep(Duration::from_millis(10));
    // Drop joins the worker; the bounded channel keeps it from running ahead.
    drop(prefetcher);
}
