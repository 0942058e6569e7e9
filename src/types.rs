/// Model input token id (signed to match downstream tensor dtypes).
/// Examples: `32`, `198`, `50256`
pub type Token = i64;
/// Untyped JSON record as read from a shard line.
/// Example: `{"post": "...", "ideal_human_summary": "..."}`
pub type RawRecord = serde_json::Map<String, serde_json::Value>;
/// Order-preserving map of passthrough record fields.
/// Keys are the raw record keys minus `reference`.
pub type FieldMap = indexmap::IndexMap<String, serde_json::Value>;
/// Identifier naming a dataset within task configuration.
/// Examples: `tldr_3_filtered`, `cnndm`
pub type DatasetId = String;
