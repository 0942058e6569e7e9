use serde::{Deserialize, Serialize};

use crate::types::{DatasetId, Token};

/// Side of a token sequence that truncation and padding operate on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationSide {
    /// Drop/pad at the front, keeping the tail of the sequence.
    Front,
    /// Drop/pad at the back, keeping the head of the sequence.
    Back,
}

/// Hyperparameters governing reference-response encoding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseHparams {
    /// Template used to format the reference response from raw record fields.
    pub ref_format_str: String,
    /// Fixed token budget for encoded responses.
    pub max_len: usize,
    /// Token used to end-pad responses shorter than `max_len`.
    pub pad_token: Token,
}

/// Hyperparameters governing query formatting and encoding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryHparams {
    /// Dataset identifier this query configuration applies to.
    pub dataset: DatasetId,
    /// Template used to format the query from raw record fields.
    pub format_str: String,
    /// Fixed token budget for encoded queries.
    pub max_len: usize,
    /// Token used to pad queries shorter than `max_len`.
    pub pad_token: Token,
    /// Side queries are truncated and padded from.
    pub truncation_side: TruncationSide,
}

/// Task configuration bundling query and response hyperparameters.
///
/// Supplied by the experiment layer; this crate only reads it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskHparams {
    /// Query formatting/encoding settings.
    pub query: QueryHparams,
    /// Response encoding settings.
    pub response: ResponseHparams,
}
