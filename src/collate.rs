//! Batch collation and bounded prefetch.
//!
//! Collation buffers exactly `batch_size` encoded examples, stacks their
//! token fields into rectangular arrays, and groups scalar/text fields into
//! parallel vectors. All examples in a group must already share per-field
//! token width; truncation and padding upstream enforce that precondition.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::codec::Example;
use crate::constants::prefetch::PREFETCH_CAPACITY;
use crate::errors::PipelineError;
use crate::types::{FieldMap, Token};

/// Rectangular batch of collated examples.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    /// Stacked context token arrays, one row per example.
    pub context_tokens: Vec<Vec<Token>>,
    /// Stacked reference token arrays, one row per example.
    pub reference_tokens: Vec<Vec<Token>>,
    /// Reference texts, present when the examples carry them.
    pub reference_text: Option<Vec<String>>,
    /// Per-example passthrough fields, present in `all_fields` mode.
    pub extra_fields: Option<Vec<FieldMap>>,
}

impl Batch {
    /// Number of examples in this batch.
    pub fn len(&self) -> usize {
        self.context_tokens.len()
    }

    /// True when the batch holds no examples.
    pub fn is_empty(&self) -> bool {
        self.context_tokens.is_empty()
    }
}

/// Lazily group a stream of examples into fixed-size batches.
///
/// With `drop_last`, a final group shorter than `batch_size` is discarded;
/// otherwise it is emitted as a short batch. `all_fields` carries each
/// example's `extra_fields` through untransformed.
pub fn collate<I>(examples: I, batch_size: usize, drop_last: bool, all_fields: bool) -> Batches<I::IntoIter>
where
    I: IntoIterator<Item = Result<Example, PipelineError>>,
{
    Batches {
        inner: examples.into_iter(),
        batch_size: batch_size.max(1),
        drop_last,
        all_fields,
        done: false,
    }
}

/// Iterator of collated batches produced by [`collate`].
pub struct Batches<I> {
    inner: I,
    batch_size: usize,
    drop_last: bool,
    all_fields: bool,
    done: bool,
}

impl<I> Iterator for Batches<I>
where
    I: Iterator<Item = Result<Example, PipelineError>>,
{
    type Item = Result<Batch, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut group = Vec::with_capacity(self.batch_size);
        while group.len() < self.batch_size {
            match self.inner.next() {
                Some(Ok(example)) => group.push(example),
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    if group.is_empty() || self.drop_last {
                        return None;
                    }
                    break;
                }
            }
        }
        Some(build_batch(group, self.all_fields))
    }
}

/// Stack one buffered group into a rectangular batch.
fn build_batch(group: Vec<Example>, all_fields: bool) -> Result<Batch, PipelineError> {
    let with_text = group
        .first()
        .map(|example| example.reference.text.is_some())
        .unwrap_or(false);
    let context_width = group.first().map(|e| e.context.tokens.len()).unwrap_or(0);
    let reference_width = group.first().map(|e| e.reference.tokens.len()).unwrap_or(0);

    let mut context_tokens = Vec::with_capacity(group.len());
    let mut reference_tokens = Vec::with_capacity(group.len());
    let mut reference_text = with_text.then(|| Vec::with_capacity(group.len()));
    let mut extra_fields = all_fields.then(|| Vec::with_capacity(group.len()));

    for example in group {
        if example.context.tokens.len() != context_width
            || example.reference.tokens.len() != reference_width
        {
            return Err(PipelineError::MalformedRecord(format!(
                "ragged batch: expected widths {context_width}/{reference_width}, got {}/{}",
                example.context.tokens.len(),
                example.reference.tokens.len()
            )));
        }
        if let Some(texts) = reference_text.as_mut() {
            let text = example.reference.text.ok_or_else(|| {
                PipelineError::MalformedRecord(
                    "reference.text present on first example but absent later in batch".to_string(),
                )
            })?;
            texts.push(text);
        }
        if let Some(extras) = extra_fields.as_mut() {
            extras.push(example.extra_fields);
        }
        context_tokens.push(example.context.tokens);
        reference_tokens.push(example.reference.tokens);
    }

    Ok(Batch {
        context_tokens,
        reference_tokens,
        reference_text,
        extra_fields,
    })
}

/// Background prefetcher keeping one batch staged ahead of the consumer.
///
/// A single worker thread pulls the upstream iterator and parks results in a
/// bounded channel. Dropping the prefetcher stops the worker cooperatively:
/// the channel closes and the worker exits on its next send.
pub struct BatchPrefetcher<T> {
    receiver: Option<mpsc::Receiver<Result<T, PipelineError>>>,
    handle: Option<thread::JoinHandle<()>>,
    stats: Arc<PrefetcherStats>,
}

#[derive(Default)]
/// Prefetcher runtime counters.
struct PrefetcherStats {
    queued: AtomicUsize,
    produced: AtomicUsize,
    errors: AtomicUsize,
}

impl<T: Send + 'static> BatchPrefetcher<T> {
    /// Spawn a worker that prefetches from `upstream` one item ahead.
    pub fn spawn<I>(upstream: I) -> Self
    where
        I: IntoIterator<Item = Result<T, PipelineError>>,
        I::IntoIter: Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(PREFETCH_CAPACITY);
        let stats = Arc::new(PrefetcherStats::default());
        let stats_thread = Arc::clone(&stats);
        let iter = upstream.into_iter();
        let handle = thread::spawn(move || {
            for result in iter {
                if result.is_err() {
                    stats_thread.errors.fetch_add(1, Ordering::Relaxed);
                }
                if sender.send(result).is_err() {
                    return;
                }
                stats_thread.queued.fetch_add(1, Ordering::Relaxed);
                stats_thread.produced.fetch_add(1, Ordering::Relaxed);
            }
        });
        Self {
            receiver: Some(receiver),
            handle: Some(handle),
            stats,
        }
    }

    /// Number of prefetched items currently staged.
    pub fn queue_len(&self) -> usize {
        self.stats.queued.load(Ordering::Relaxed)
    }

    /// Total number of items pulled from upstream by the worker.
    pub fn produced_count(&self) -> usize {
        self.stats.produced.load(Ordering::Relaxed)
    }

    /// Total number of upstream errors observed by the worker.
    pub fn error_count(&self) -> usize {
        self.stats.errors.load(Ordering::Relaxed)
    }
}

impl<T> Iterator for BatchPrefetcher<T> {
    type Item = Result<T, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.receiver.as_ref()?.recv().ok();
        if result.is_some() {
            self.stats
                .queued
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| {
                    Some(value.saturating_sub(1))
                })
                .ok();
        }
        result
    }
}

impl<T> Drop for BatchPrefetcher<T> {
    fn drop(&mut self) {
        self.receiver.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
