/// Constants used by shard file naming and discovery.
pub mod shard {
    /// Filename prefix shared by every shard file.
    pub const SHARD_PREFIX: &str = "samples.";
    /// Filename suffix shared by every shard file.
    pub const SHARD_SUFFIX: &str = ".jsonl";
    /// Filename of the single shard written by comparison normalization.
    pub const NORMALIZED_SHARD_NAME: &str = "samples.0.jsonl";
}

/// Constants used by record field naming at the codec boundary.
pub mod fields {
    /// Key holding the tokenized context within an encoded example.
    pub const FIELD_CONTEXT: &str = "context";
    /// Key holding the reference response within an encoded example.
    pub const FIELD_REFERENCE: &str = "reference";
    /// Key holding token arrays within context/reference sub-objects.
    pub const FIELD_TOKENS: &str = "tokens";
    /// Key holding the untruncated reference text, when kept.
    pub const FIELD_TEXT: &str = "text";
    /// Key holding passthrough fields within an encoded example.
    pub const FIELD_EXTRA: &str = "extra_fields";
    /// Raw-record key holding the human-written reference summary.
    pub const FIELD_IDEAL_SUMMARY: &str = "ideal_human_summary";
    /// Raw-record key holding candidate summary A.
    pub const FIELD_SUMMARY_A: &str = "generated_summary_A";
    /// Raw-record key holding candidate summary B.
    pub const FIELD_SUMMARY_B: &str = "generated_summary_B";
    /// Raw-record key holding the pairwise preference label.
    pub const FIELD_PREFERENCE: &str = "comparison_preference";
    /// Marker whose presence in a preference label selects candidate A.
    pub const PREFERENCE_MARKER_A: &str = "A";
}

/// Constants used by prefetcher failure reporting.
pub mod prefetch {
    /// Bounded queue depth: at most one batch is staged ahead of the consumer.
    pub const PREFETCH_CAPACITY: usize = 1;
}
