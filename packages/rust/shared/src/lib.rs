//! Shared types, error model, and configuration for apiscout.
//!
//! This crate is the foundation depended on by all other apiscout crates.
//! It provides:
//! - [`ApiScoutError`]: the unified error type
//! - Domain types ([`DocumentContent`], [`Endpoint`], [`SecurityScheme`], [`ExtractionResult`])
//! - Configuration ([`AppConfig`] and the runtime configs derived from it)
//! - Content digests for cache keys

pub mod config;
pub mod digest;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, CacheSection, CrawlSection, DEFAULT_USER_AGENT, DiscoveryConfig,
    ExtractionConfig, FetchConfig, FilterSection, HeuristicPolicy, HeuristicsSection,
    ModelSection, RenderConfig, RenderSection, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, resolve_api_key, validate_api_key,
};
pub use digest::{content_digest, prefix_digest};
pub use error::{ApiScoutError, Result};
pub use types::{
    Confidence, DEFAULT_CONTENT_TYPE, DataType, DocumentContent, Endpoint, ExtractionResult,
    HttpMethod, Parameter, ParameterLocation, RequestBody, Response, RunId, SchemeKind, Schema,
    SecurityScheme, normalize_path, schemes_equivalent,
};
