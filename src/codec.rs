//! JSONL example encoding and decoding.
//!
//! Examples are stored one JSON object per shard line with plain nested
//! integer arrays; no binary or tensor encoding happens at this layer.
//! Decoding validates the required structure up front and fails fast with
//! `MalformedRecord` rather than deferring to later field access.

use serde_json::{json, Map, Value};

use crate::constants::fields::{
    FIELD_CONTEXT, FIELD_EXTRA, FIELD_REFERENCE, FIELD_TEXT, FIELD_TOKENS,
};
use crate::errors::PipelineError;
use crate::types::{FieldMap, Token};

/// Tokenized query context for one example.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenField {
    /// Fixed-width token array (truncated/padded upstream).
    pub tokens: Vec<Token>,
}

/// Reference response for one example.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceField {
    /// Fixed-width token array; truncated even when `text` is not.
    pub tokens: Vec<Token>,
    /// Untruncated reference text, when kept.
    pub text: Option<String>,
}

/// One encoded training/eval example.
#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    /// Tokenized query context.
    pub context: TokenField,
    /// Tokenized (and optionally textual) reference response.
    pub reference: ReferenceField,
    /// Passthrough record fields; never contains the key `reference`.
    pub extra_fields: FieldMap,
}

/// Serialize an example into a JSON-compatible mapping.
pub fn encode_example(example: &Example) -> Value {
    let mut reference = Map::new();
    reference.insert(FIELD_TOKENS.to_string(), json!(example.reference.tokens));
    if let Some(text) = &example.reference.text {
        reference.insert(FIELD_TEXT.to_string(), Value::String(text.clone()));
    }
    let extra: Map<String, Value> = example
        .extra_fields
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    json!({
        FIELD_CONTEXT: { FIELD_TOKENS: example.context.tokens },
        FIELD_REFERENCE: reference,
        FIELD_EXTRA: extra,
    })
}

/// Reconstruct an example from its encoded mapping.
///
/// Round-trip law: `decode_example(&encode_example(&e)) == Ok(e)` for any
/// well-formed `e`.
pub fn decode_example(encoded: &Value) -> Result<Example, PipelineError> {
    let root = encoded
        .as_object()
        .ok_or_else(|| malformed("example is not a JSON object"))?;

    let context_tokens = token_array(root, FIELD_CONTEXT)?;
    let reference_tokens = token_array(root, FIELD_REFERENCE)?;
    let reference_text = root
        .get(FIELD_REFERENCE)
        .and_then(Value::as_object)
        .and_then(|obj| obj.get(FIELD_TEXT))
        .map(|value| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed("reference.text is not a string"))
        })
        .transpose()?;

    let extra_fields: FieldMap = match root.get(FIELD_EXTRA) {
        None => FieldMap::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        Some(_) => return Err(malformed("extra_fields is not an object")),
    };
    // The reference is the label; a record smuggling it through extras
    // would leak it to the consumer.
    if extra_fields.contains_key(FIELD_REFERENCE) {
        return Err(malformed("extra_fields contains the reserved key 'reference'"));
    }

    Ok(Example {
        context: TokenField {
            tokens: context_tokens,
        },
        reference: ReferenceField {
            tokens: reference_tokens,
            text: reference_text,
        },
        extra_fields,
    })
}

fn malformed(detail: &str) -> PipelineError {
    PipelineError::MalformedRecord(detail.to_string())
}

/// Extract `root[section].tokens` as a token vector, validating shape.
fn token_array(root: &Map<String, Value>, section: &str) -> Result<Vec<Token>, PipelineError> {
    let tokens = root
        .get(section)
        .ok_or_else(|| malformed(&format!("missing key '{section}'")))?
        .as_object()
        .ok_or_else(|| malformed(&format!("'{section}' is not an object")))?
        .get(FIELD_TOKENS)
        .ok_or_else(|| malformed(&format!("missing key '{section}.{FIELD_TOKENS}'")))?
        .as_array()
        .ok_or_else(|| malformed(&format!("'{section}.{FIELD_TOKENS}' is not an array")))?;
    tokens
        .iter()
        .map(|value| {
            value
                .as_i64()
                .ok_or_else(|| malformed(&format!("'{section}.{FIELD_TOKENS}' holds a non-integer")))
        })
        .collect()
}
