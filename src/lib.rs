#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// JSONL example encoding/decoding.
pub mod codec;
/// Batch collation and bounded prefetch.
pub mod collate;
/// Task hyperparameter types.
pub mod config;
/// Centralized constants used across shard naming, fields, and prefetch.
pub mod constants;
/// Response/query encoding and templating.
pub mod encode;
/// Replica layout and stream distribution.
pub mod layout;
/// Pairwise-preference normalization.
pub mod normalize;
/// End-to-end task iteration.
pub mod pipeline;
/// Sharded JSONL reading.
pub mod shard;
/// Blob storage capability boundary.
pub mod storage;
/// Tokenizer capability boundary.
pub mod tokenizer;
/// Shared type aliases.
pub mod types;

mod errors;

pub use codec::{decode_example, encode_example, Example, ReferenceField, TokenField};
pub use collate::{collate, Batch, BatchPrefetcher, Batches};
pub use config::{QueryHparams, ResponseHparams, TaskHparams, TruncationSide};
pub use encode::{format_template, QueryInfo, QueryProcessor, ResponseEncoder};
pub use errors::PipelineError;
pub use layout::{distribute, Distribute, Layout};
pub use normalize::{ComparisonNormalizer, NormalizedComparisonExample};
pub use pipeline::{iter_for_task, record_stream, TaskEncoder, TaskIterOptions};
pub use shard::{ShardReader, ShardRecords};
pub use storage::{BlobStore, LocalStore};
pub use tokenizer::{CharTokenizer, Tokenizer};
pub use types::{DatasetId, FieldMap, RawRecord, Token};
