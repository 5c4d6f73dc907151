//! Pipeline coordination and the cross-document domain logic for apiscout.
//!
//! This crate ties discovery, fetching, normalization and extraction into one
//! run ([`Pipeline::run`]), then merges, filters and scores the results:
//! - [`canonicalize`]: dedup by `(path, method)` keeping the highest confidence
//! - [`relevance`]: keyword-expanded free-text filtering
//! - [`coverage`]: completeness metrics and a quality score

pub mod canonicalize;
pub mod coverage;
pub mod pipeline;
pub mod relevance;

pub use canonicalize::{ApiMetadata, CanonicalApi, merge};
pub use coverage::{ConfidenceDistribution, CoverageReport};
pub use pipeline::{
    DEFAULT_THRESHOLD, Pipeline, PipelineConfig, PipelineDeps, PipelineOutput, ProgressReporter,
    RunOptions, RunStatus, SilentProgress,
};
pub use relevance::{FilterReport, FilterSummary, ScoredEndpoint, TopMatch, expand_keywords};
