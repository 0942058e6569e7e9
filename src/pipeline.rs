//! End-to-end task iteration.
//!
//! Composes the shard reader, replica distribution, per-record encoding, and
//! batch collation into the iterator a consumer actually trains or evaluates
//! against. Every stage stays lazy; the only optional thread is the single
//! bounded prefetch slot.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{Example, ReferenceField, TokenField};
use crate::collate::{collate, Batch, BatchPrefetcher};
use crate::config::TaskHparams;
use crate::constants::fields::FIELD_REFERENCE;
use crate::encode::{QueryProcessor, ResponseEncoder};
use crate::errors::PipelineError;
use crate::layout::Layout;
use crate::shard::ShardReader;
use crate::storage::BlobStore;
use crate::tokenizer::Tokenizer;
use crate::types::{FieldMap, RawRecord};

/// Options for [`iter_for_task`].
#[derive(Clone, Debug)]
pub struct TaskIterOptions {
    /// Number of examples per collated batch.
    pub batch_size: usize,
    /// Replica layout; `None` keeps the full stream.
    pub layout: Option<Layout>,
    /// Carry passthrough record fields into batches.
    pub all_fields: bool,
    /// Discard a short trailing batch.
    pub drop_last: bool,
    /// Background prefetch workers; only 0 and 1 are supported.
    pub num_workers: usize,
}

impl Default for TaskIterOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            layout: None,
            all_fields: false,
            drop_last: true,
            num_workers: 1,
        }
    }
}

/// Per-record encoder turning raw records into fixed-width examples.
pub struct TaskEncoder {
    response_encoder: ResponseEncoder,
    query_processor: QueryProcessor,
}

impl TaskEncoder {
    /// Build the encoder pair for a task configuration.
    pub fn new(task: &TaskHparams, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            response_encoder: ResponseEncoder::new(task.response.clone(), tokenizer.clone()),
            query_processor: QueryProcessor::new(task.query.clone(), tokenizer),
        }
    }

    /// The response encoder half.
    pub fn response_encoder(&self) -> &ResponseEncoder {
        &self.response_encoder
    }

    /// The query processor half.
    pub fn query_processor(&self) -> &QueryProcessor {
        &self.query_processor
    }

    /// Encode one raw record into an `Example`.
    ///
    /// Reference tokens are truncated and end-padded to the response budget;
    /// the reference text is kept untruncated. With `all_fields`, every raw
    /// field except `reference` passes through (the key is always removed so
    /// the label cannot leak into extras).
    pub fn build_example(
        &self,
        record: RawRecord,
        all_fields: bool,
    ) -> Result<Example, PipelineError> {
        let ref_response = self.response_encoder.format_ref_response(&record)?;
        let ref_tokens = self.response_encoder.encode_response(&ref_response, true)?;
        let ref_tokens = self.response_encoder.pad(ref_tokens);
        let query = self.query_processor.process(&record)?;

        let extra_fields: FieldMap = if all_fields {
            record
                .into_iter()
                .filter(|(key, _)| key != FIELD_REFERENCE)
                .collect()
        } else {
            FieldMap::new()
        };

        Ok(Example {
            context: TokenField {
                tokens: query.tokens,
            },
            reference: ReferenceField {
                tokens: ref_tokens,
                text: Some(ref_response),
            },
            extra_fields,
        })
    }
}

/// Stream raw records for a task input, restricted to this replica.
///
/// Mirrors shard-then-line order; with a layout, only the record positions
/// owned by the replica are yielded. Errors do not occupy stream positions:
/// an unreadable shard or malformed line is fatal and surfaces on every
/// replica, never just the one whose index happens to line up with it.
pub fn record_stream(
    store: Arc<dyn BlobStore>,
    input_path: &str,
    layout: Option<Layout>,
) -> Result<Box<dyn Iterator<Item = Result<RawRecord, PipelineError>> + Send>, PipelineError> {
    let records = ShardReader::new(store).iter(input_path)?;
    Ok(match layout {
        Some(layout) => {
            let mut position = 0usize;
            Box::new(records.filter(move |record| match record {
                Ok(_) => {
                    let owned = layout.owns(position);
                    position += 1;
                    owned
                }
                Err(_) => true,
            }))
        }
        None => Box::new(records),
    })
}

/// Build the batched example iterator for a task over sharded input.
///
/// Shard stream → optional replica distribution → per-record encoding →
/// fixed-size collation → optional single-slot prefetch.
pub fn iter_for_task(
    task: &TaskHparams,
    tokenizer: Arc<dyn Tokenizer>,
    store: Arc<dyn BlobStore>,
    input_path: &str,
    options: TaskIterOptions,
) -> Result<Box<dyn Iterator<Item = Result<Batch, PipelineError>> + Send>, PipelineError> {
    if options.num_workers > 1 {
        return Err(PipelineError::Configuration(format!(
            "num_workers must be 0 or 1, got {}",
            options.num_workers
        )));
    }
    debug!(
        input_path,
        batch_size = options.batch_size,
        all_fields = options.all_fields,
        num_workers = options.num_workers,
        "building task iterator"
    );
    let encoder = TaskEncoder::new(task, tokenizer);
    let all_fields = options.all_fields;
    let examples = record_stream(store, input_path, options.layout)?
        .map(move |record| record.and_then(|record| encoder.build_example(record, all_fields)));
    let batches = collate(
        examples,
        options.batch_size,
        options.drop_last,
        options.all_fields,
    );
    Ok(if options.num_workers == 1 {
        Box::new(BatchPrefetcher::spawn(batches))
    } else {
        Box::new(batches)
    })
}
