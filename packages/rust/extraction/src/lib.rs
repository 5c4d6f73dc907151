//! Per-document extraction of endpoint and security facts.
//!
//! [`Extractor::extract`] runs three tiers, first success wins:
//! 1. An embedded OpenAPI/Swagger spec, converted directly at high confidence
//! 2. A cached result for the same text prefix
//! 3. The model boundary ([`StructuredExtractor`]), enhanced by pattern-based
//!    authentication detection and written back to the cache
//!
//! Extraction never fails: any internal error yields an empty low-confidence result.

pub mod auth;
pub mod embedded;
pub mod model;
pub mod prompt;
pub mod records;

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use apiscout_shared::{DocumentContent, ExtractionConfig, ExtractionResult, prefix_digest};
use apiscout_storage::ResultCache;

pub use auth::{detect_auth_schemes, enhance_schemes};
pub use embedded::extract_embedded;
pub use model::{
    AnthropicExtractor, ExtractionRequest, RecordKind, StructuredExtractor, StructuredRecord,
    ToolSpec, extraction_tools,
};
pub use records::result_from_records;

/// Characters of document text that feed the cache key.
pub const DIGEST_PREFIX_CHARS: usize = 50_000;

/// The three-tier extraction engine. Stateless per call.
pub struct Extractor {
    model: Arc<dyn StructuredExtractor>,
    cache: Option<Arc<ResultCache>>,
    config: ExtractionConfig,
    tools: Vec<ToolSpec>,
}

impl Extractor {
    pub fn new(
        model: Arc<dyn StructuredExtractor>,
        cache: Option<Arc<ResultCache>>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            model,
            cache,
            config,
            tools: extraction_tools(),
        }
    }

    /// Extract facts from one document.
    #[instrument(skip_all, fields(url = %content.url))]
    pub async fn extract(&self, content: &DocumentContent) -> ExtractionResult {
        if let Some(result) = extract_embedded(content) {
            info!(
                endpoints = result.endpoints.len(),
                "using embedded spec"
            );
            return result;
        }

        let digest = prefix_digest(&content.text, DIGEST_PREFIX_CHARS);
        if let Some(cached) = self.cached(&digest).await {
            info!(endpoints = cached.endpoints.len(), "using cached extraction");
            return cached;
        }

        let document = prompt::document_text(
            content,
            self.config.max_code_samples,
            self.config.max_prompt_chars,
        );
        let prompt = prompt::render_prompt(&document);
        let request = ExtractionRequest {
            prompt: &prompt,
            tools: &self.tools,
        };

        let records = match self.model.extract(&request).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "model extraction failed");
                return ExtractionResult::empty();
            }
        };

        let mut result = result_from_records(&records, &content.url);
        result.security_schemes = enhance_schemes(result.security_schemes, &document);

        self.store(&digest, &result).await;

        info!(
            endpoints = result.endpoints.len(),
            schemes = result.security_schemes.len(),
            confidence = %result.confidence,
            "model extraction done"
        );
        result
    }

    async fn cached(&self, digest: &str) -> Option<ExtractionResult> {
        let cache = self.cache.as_ref()?;
        match cache.get_extraction(digest).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "extraction cache read failed");
                None
            }
        }
    }

    async fn store(&self, digest: &str, result: &ExtractionResult) {
        let Some(cache) = &self.cache else {
            return;
        };
        match cache.set_extraction(digest, result).await {
            Ok(()) => debug!(digest, "extraction cached"),
            Err(e) => warn!(error = %e, "extraction cache write failed"),
        }
    }
}
