//! The documentation heuristic: does this page look like HTTP API docs?
//!
//! Pattern tables are plain data; [`DocHeuristics::new`] compiles them once
//! and every check after that is a pure function of `(url path, body)`.

use regex::RegexSet;
use tracing::debug;
use url::Url;

use apiscout_shared::{ApiScoutError, HeuristicPolicy, Result};

/// Conventional documentation locations probed under the base URL.
pub const PROBE_PATHS: &[&str] = &[
    "/api/docs",
    "/api-docs",
    "/api/documentation",
    "/docs",
    "/docs/api",
    "/documentation",
    "/documentation/api",
    "/developers",
    "/developer",
    "/dev/docs",
    "/reference",
    "/api-reference",
    "/api/reference",
    "/guides/api",
    "/v1/docs",
    "/v2/docs",
    "/api/v1/docs",
    "/api/v2/docs",
    "/guide",
    "/guides",
    "/tutorial",
    "/tutorials",
    "/getting-started",
    "/quickstart",
    "/quick-start",
    "/how-to",
    "/api-guide",
    "/rest-api",
    "/graphql",
    "/resources",
    "/help",
    "/support/api",
];

/// Paths that are API docs on their own.
const STRONG_URL_PATTERNS: &[&str] = &[r"/api.*docs?", r"/api.*reference", r"/rest.*api", r"/graphql"];

/// Paths that look like documentation but need corroborating content.
const LOOSE_URL_PATTERNS: &[&str] = &[
    r"/api",
    r"/docs?",
    r"/documentation",
    r"/reference",
    r"/api.?reference",
    r"/developers?",
    r"/guides?",
    r"/tutorials?",
    r"/getting.?started",
    r"/quick.?start",
    r"/how.?to",
    r"/resources",
    r"/help",
    r"/support/api",
    r"/knowledge.?base",
    r"endpoint",
    r"authentication",
    r"authorization",
    r"/rest",
    r"/graphql",
    r"/webhook",
];

/// API vocabulary, counted as distinct substrings of the lowercased body.
const API_KEYWORDS: &[&str] = &[
    "endpoint",
    "api",
    "request",
    "response",
    "authentication",
    "get",
    "post",
    "put",
    "delete",
    "parameter",
    "header",
    "body",
    "json",
];

/// Example-request verbs, matched case-sensitively on the raw body.
const HTTP_METHOD_TOKENS: &[&str] = &["GET ", "POST ", "PUT ", "DELETE ", "PATCH "];

/// Embedded structured-spec markers, matched on the lowercased body.
const SPEC_MARKERS: &[&str] = &["\"openapi\"", "\"swagger\""];

/// Which rule classified a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocSignal {
    StrongUrl,
    LooseUrlWithKeywords,
    EmbeddedSpec,
    KeywordDensity,
    HttpMethods,
}

/// Compiled classifier.
#[derive(Debug, Clone)]
pub struct DocHeuristics {
    strong: RegexSet,
    loose: RegexSet,
    policy: HeuristicPolicy,
}

impl DocHeuristics {
    pub fn new(policy: HeuristicPolicy) -> Result<Self> {
        let strong = RegexSet::new(STRONG_URL_PATTERNS)
            .map_err(|e| ApiScoutError::config(format!("strong URL patterns: {e}")))?;
        let loose = RegexSet::new(LOOSE_URL_PATTERNS)
            .map_err(|e| ApiScoutError::config(format!("loose URL patterns: {e}")))?;
        Ok(Self {
            strong,
            loose,
            policy,
        })
    }

    pub fn policy(&self) -> &HeuristicPolicy {
        &self.policy
    }

    /// Whether the URL path loosely looks like documentation.
    pub fn is_doc_like_url(&self, url: &Url) -> bool {
        self.loose.is_match(&url.path().to_ascii_lowercase())
    }

    /// Whether a fetched page is likely API documentation.
    pub fn is_api_documentation(&self, url: &Url, body: &str) -> bool {
        match self.classify(url, body) {
            Some(signal) => {
                debug!(%url, ?signal, "page classified as documentation");
                true
            }
            None => {
                debug!(%url, "page does not look like documentation");
                false
            }
        }
    }

    /// The first rule that fires, in order of confidence.
    pub fn classify(&self, url: &Url, body: &str) -> Option<DocSignal> {
        let path = url.path().to_ascii_lowercase();
        if self.strong.is_match(&path) {
            return Some(DocSignal::StrongUrl);
        }

        let lower = body.to_lowercase();
        let keywords = keyword_count(&lower);

        if self.loose.is_match(&path) && keywords >= self.policy.loose_keyword_threshold {
            return Some(DocSignal::LooseUrlWithKeywords);
        }
        if SPEC_MARKERS.iter().any(|m| lower.contains(m)) {
            return Some(DocSignal::EmbeddedSpec);
        }
        if keywords >= self.policy.keyword_density_threshold {
            return Some(DocSignal::KeywordDensity);
        }
        if http_method_count(body) >= self.policy.http_method_threshold {
            return Some(DocSignal::HttpMethods);
        }
        None
    }
}

/// Distinct API keywords present in an already-lowercased body.
pub fn keyword_count(lower_body: &str) -> usize {
    API_KEYWORDS
        .iter()
        .filter(|kw| lower_body.contains(*kw))
        .count()
}

/// Distinct upper-case method tokens present in the raw body.
pub fn http_method_count(body: &str) -> usize {
    HTTP_METHOD_TOKENS
        .iter()
        .filter(|m| body.contains(*m))
        .count()
}
