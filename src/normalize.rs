//! Pairwise-preference normalization.
//!
//! Raw comparison records carry two candidate summaries labeled A/B plus a
//! human preference label. Normalization reorders them into a canonical
//! chosen/rejected/reference triple, tokenizes everything under the task
//! budgets, and can write the result back out as a single `samples.0.jsonl`
//! shard next to the input.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::fields::{
    FIELD_IDEAL_SUMMARY, FIELD_PREFERENCE, FIELD_SUMMARY_A, FIELD_SUMMARY_B, PREFERENCE_MARKER_A,
};
use crate::constants::shard::NORMALIZED_SHARD_NAME;
use crate::encode::{QueryProcessor, ResponseEncoder};
use crate::errors::PipelineError;
use crate::storage::BlobStore;
use crate::types::{RawRecord, Token};

/// Canonical 3-way comparison example: chosen, rejected, reference.
///
/// `samples[0]`/`sample_tokens[0]` always hold the preferred candidate,
/// regardless of its original A/B label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedComparisonExample {
    /// Formatted query text (untruncated).
    pub context: String,
    /// Fixed-width query token array.
    pub context_tokens: Vec<Token>,
    /// Candidate and reference texts: `[chosen, rejected, reference]`.
    pub samples: Vec<String>,
    /// Token arrays parallel to `samples`.
    pub sample_tokens: Vec<Vec<Token>>,
    /// Reference summary text (space-prefixed, untruncated).
    #[serde(rename = "ref")]
    pub ref_text: String,
    /// Truncated reference token array.
    pub ref_tokens: Vec<Token>,
}

/// Converts raw pairwise-preference records into canonical 3-way examples.
pub struct ComparisonNormalizer {
    response_encoder: ResponseEncoder,
    query_processor: QueryProcessor,
}

impl ComparisonNormalizer {
    /// Create a normalizer from the task's response and query encoders.
    pub fn new(response_encoder: ResponseEncoder, query_processor: QueryProcessor) -> Self {
        Self {
            response_encoder,
            query_processor,
        }
    }

    /// Normalize one raw comparison record.
    ///
    /// The preference label selects ordering: any label containing `"A"`
    /// prefers candidate A; every other label, malformed ones included,
    /// prefers B. That default is documented upstream behavior, not silently
    /// corrected here.
    pub fn normalize(
        &self,
        record: &RawRecord,
    ) -> Result<NormalizedComparisonExample, PipelineError> {
        // Leading space is the formatting convention the tokenizer expects
        // at the response boundary.
        let ref_text = format!(" {}", string_field(record, FIELD_IDEAL_SUMMARY)?);
        let formatted_a = format!(" {}", string_field(record, FIELD_SUMMARY_A)?);
        let formatted_b = format!(" {}", string_field(record, FIELD_SUMMARY_B)?);
        let preference = string_field(record, FIELD_PREFERENCE)?;

        let mut samples = if preference.contains(PREFERENCE_MARKER_A) {
            vec![formatted_a, formatted_b]
        } else {
            vec![formatted_b, formatted_a]
        };
        samples.push(ref_text.clone());

        let sample_tokens = samples
            .iter()
            .map(|sample| self.response_encoder.encode_response(sample, true))
            .collect::<Result<Vec<_>, _>>()?;
        let ref_tokens = self.response_encoder.encode_response(&ref_text, true)?;
        let query = self.query_processor.process(record)?;

        Ok(NormalizedComparisonExample {
            context: query.text,
            context_tokens: query.tokens,
            samples,
            sample_tokens,
            ref_text,
            ref_tokens,
        })
    }

    /// Normalize every record in `input_file` and write `samples.0.jsonl`.
    ///
    /// The output lands in the directory containing the input (the local
    /// cache directory when the input was remote), one normalized example
    /// per line in input order. Returns the output path.
    pub fn normalize_file(
        &self,
        store: &Arc<dyn BlobStore>,
        input_file: &str,
    ) -> Result<PathBuf, PipelineError> {
        let local_input = if store.is_blob_url(input_file) {
            let (parent, file_name) = split_url(input_file)?;
            store.download_directory_cached(parent)?.join(file_name)
        } else {
            PathBuf::from(input_file)
        };
        let output_path = local_input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join(NORMALIZED_SHARD_NAME);

        let reader = store.open(&local_input)?;
        let mut writer = store.create(&output_path)?;
        let mut written = 0usize;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| PipelineError::ShardUnavailable {
                path: local_input.display().to_string(),
                reason: format!("failed reading line {}: {err}", line_no + 1),
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: RawRecord = serde_json::from_str(trimmed).map_err(|err| {
                PipelineError::MalformedRecord(format!(
                    "{} line {}: {err}",
                    local_input.display(),
                    line_no + 1
                ))
            })?;
            let normalized = self.normalize(&record)?;
            let encoded = serde_json::to_string(&normalized)
                .map_err(|err| PipelineError::MalformedRecord(err.to_string()))?;
            writer.write_all(encoded.as_bytes())?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        writer.flush()?;
        info!(
            input = %local_input.display(),
            output = %output_path.display(),
            written,
            "normalized comparison records"
        );
        Ok(output_path)
    }
}

/// Read a required string field off a raw record.
fn string_field<'a>(record: &'a RawRecord, field: &str) -> Result<&'a str, PipelineError> {
    record
        .get(field)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            PipelineError::MalformedRecord(format!("missing or non-string field '{field}'"))
        })
}

/// Split a blob URL into its parent directory and file name.
fn split_url(url: &str) -> Result<(&str, &str), PipelineError> {
    url.rsplit_once('/')
        .filter(|(parent, name)| !parent.is_empty() && !name.is_empty())
        .ok_or_else(|| {
            PipelineError::Storage(format!("cannot split '{url}' into directory and file"))
        })
}
