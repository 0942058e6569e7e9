//! Response and query encoding under fixed token budgets.
//!
//! Both encoders take the tokenizer capability explicitly at construction;
//! there is no shared default. Truncation is deterministic: responses drop
//! the tail, queries drop from the configured side.

use std::sync::Arc;

use serde_json::Value;

use crate::config::{QueryHparams, ResponseHparams, TruncationSide};
use crate::errors::PipelineError;
use crate::tokenizer::Tokenizer;
use crate::types::{RawRecord, Token};

/// Format a `{field}`-style template from raw record fields.
///
/// `{{` and `}}` escape literal braces. String fields substitute verbatim;
/// other JSON values substitute via their compact JSON rendering. Fails with
/// `MissingTemplateField` when the record lacks a referenced field.
pub fn format_template(template: &str, record: &RawRecord) -> Result<String, PipelineError> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(inner) => field.push(inner),
                        None => {
                            return Err(PipelineError::MalformedRecord(format!(
                                "unterminated placeholder '{{{field}' in template"
                            )))
                        }
                    }
                }
                let value =
                    record
                        .get(&field)
                        .ok_or_else(|| PipelineError::MissingTemplateField {
                            field: field.clone(),
                        })?;
                match value {
                    Value::String(text) => output.push_str(text),
                    other => output.push_str(&other.to_string()),
                }
            }
            other => output.push(other),
        }
    }
    Ok(output)
}

/// Tokenizes and truncates a single text response to a fixed budget.
pub struct ResponseEncoder {
    tokenizer: Arc<dyn Tokenizer>,
    hparams: ResponseHparams,
}

impl ResponseEncoder {
    /// Create an encoder from hyperparameters and an injected tokenizer.
    pub fn new(hparams: ResponseHparams, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer, hparams }
    }

    /// Response hyperparameters this encoder was built with.
    pub fn hparams(&self) -> &ResponseHparams {
        &self.hparams
    }

    /// Format the reference response for a raw record via `ref_format_str`.
    pub fn format_ref_response(&self, record: &RawRecord) -> Result<String, PipelineError> {
        format_template(&self.hparams.ref_format_str, record)
    }

    /// Tokenize `text`, truncating the tail to `max_len` when allowed.
    ///
    /// The result is always at most `max_len` tokens long, and exactly
    /// `max_len` whenever the source reached the budget. Over-length input
    /// with truncation disallowed fails with `ResponseTooLong`.
    pub fn encode_response(
        &self,
        text: &str,
        allow_truncate: bool,
    ) -> Result<Vec<Token>, PipelineError> {
        let mut tokens = self.tokenizer.encode(text);
        if tokens.len() > self.hparams.max_len {
            if !allow_truncate {
                return Err(PipelineError::ResponseTooLong {
                    actual: tokens.len(),
                    max_len: self.hparams.max_len,
                });
            }
            tokens.truncate(self.hparams.max_len);
        }
        Ok(tokens)
    }

    /// End-pad `tokens` to exactly `max_len` with the configured pad token.
    ///
    /// Used by the pipeline layer to keep collated batches rectangular.
    pub fn pad(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        tokens.resize(self.hparams.max_len, self.hparams.pad_token);
        tokens
    }
}

/// Formatted and tokenized query for one raw record.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryInfo {
    /// Fixed-width query token array.
    pub tokens: Vec<Token>,
    /// Formatted query text before tokenization.
    pub text: String,
}

/// Formats and tokenizes a templated query from a raw record.
pub struct QueryProcessor {
    tokenizer: Arc<dyn Tokenizer>,
    hparams: QueryHparams,
}

impl QueryProcessor {
    /// Create a processor from hyperparameters and an injected tokenizer.
    pub fn new(hparams: QueryHparams, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer, hparams }
    }

    /// Query hyperparameters this processor was built with.
    pub fn hparams(&self) -> &QueryHparams {
        &self.hparams
    }

    /// Format, tokenize, and fit a query to the configured budget.
    ///
    /// Truncation and padding both operate on the configured side, so the
    /// result is always exactly `max_len` tokens wide.
    pub fn process(&self, record: &RawRecord) -> Result<QueryInfo, PipelineError> {
        let text = format_template(&self.hparams.format_str, record)?;
        let mut tokens = self.tokenizer.encode(&text);
        let max_len = self.hparams.max_len;
        if tokens.len() > max_len {
            let overflow = tokens.len() - max_len;
            match self.hparams.truncation_side {
                TruncationSide::Front => {
                    tokens.drain(..overflow);
                }
                TruncationSide::Back => tokens.truncate(max_len),
            }
        } else if tokens.len() < max_len {
            let missing = max_len - tokens.len();
            match self.hparams.truncation_side {
                TruncationSide::Front => {
                    let mut padded = vec![self.hparams.pad_token; missing];
                    padded.extend(tokens);
                    tokens = padded;
                }
                TruncationSide::Back => tokens.resize(max_len, self.hparams.pad_token),
            }
        }
        Ok(QueryInfo { tokens, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::CharTokenizer;
    use serde_json::json;

    fn record(entries: &[(&str, Value)]) -> RawRecord {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    fn response_encoder(max_len: usize) -> ResponseEncoder {
        ResponseEncoder::new(
            ResponseHparams {
                ref_format_str: " {ideal_human_summary}".into(),
                max_len,
                pad_token: 0,
            },
            Arc::new(CharTokenizer),
        )
    }

    #[test]
    fn template_substitutes_fields_and_escapes_braces() {
        let rec = record(&[("post", json!("hello")), ("score", json!(3))]);
        let formatted = format_template("{{p}}: {post} ({score})", &rec).unwrap();
        assert_eq!(formatted, "{p}: hello (3)");
    }

    #[test]
    fn template_fails_on_missing_field() {
        let rec = record(&[("post", json!("hello"))]);
        let err = format_template("{post} {subreddit}", &rec);
        assert!(matches!(
            err,
            Err(PipelineError::MissingTemplateField { field }) if field == "subreddit"
        ));
    }

    #[test]
    fn encode_response_truncates_to_exactly_max_len() {
        let encoder = response_encoder(5);
        let tokens = encoder.encode_response("0123456789", true).unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens, CharTokenizer.encode("01234"));
    }

    #[test]
    fn encode_response_rejects_long_text_when_truncation_disallowed() {
        let encoder = response_encoder(5);
        assert!(matches!(
            encoder.encode_response("0123456789", false),
            Err(PipelineError::ResponseTooLong {
                actual: 10,
                max_len: 5
            })
        ));
    }

    #[test]
    fn encode_response_keeps_short_text_unpadded() {
        let encoder = response_encoder(5);
        let tokens = encoder.encode_response("ab", false).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(encoder.pad(tokens), vec![97, 98, 0, 0, 0]);
    }

    #[test]
    fn query_processor_truncates_from_the_front() {
        let processor = QueryProcessor::new(
            QueryHparams {
                dataset: "test".into(),
                format_str: "{post}".into(),
                max_len: 4,
                pad_token: 0,
                truncation_side: TruncationSide::Front,
            },
            Arc::new(CharTokenizer),
        );
        let info = processor.process(&record(&[("post", json!("abcdef"))])).unwrap();
        assert_eq!(info.tokens, CharTokenizer.encode("cdef"));
        assert_eq!(info.text, "abcdef");
    }

    #[test]
    fn query_processor_pads_on_the_truncation_side() {
        let front = QueryProcessor::new(
            QueryHparams {
                dataset: "test".into(),
                format_str: "{post}".into(),
                max_len: 4,
                pad_token: 9,
                truncation_side: TruncationSide::Front,
            },
            Arc::new(CharTokenizer),
        );
        let info = front.process(&record(&[("post", json!("ab"))])).unwrap();
        assert_eq!(info.tokens, vec![9, 9, 97, 98]);

        let back = QueryProcessor::new(
            QueryHparams {
                dataset: "test".into(),
                format_str: "{post}".into(),
                max_len: 4,
                pad_token: 9,
                truncation_side: TruncationSide::Back,
            },
            Arc::new(CharTokenizer),
        );
        let info = back.process(&record(&[("post", json!("ab"))])).unwrap();
        assert_eq!(info.tokens, vec![97, 98, 9, 9]);
    }
}
