//! Free-text relevance filtering over canonical endpoints.
//!
//! The query is tokenized, stop words are dropped, and each remaining word is
//! expanded through a fixed synonym table. The expanded set drives scoring.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use apiscout_shared::{Endpoint, HttpMethod};

/// Score boost when a keyword occurs inside the path.
const PATH_BOOST: f64 = 0.2;

/// Entries reported in [`FilterSummary::top_matches`].
const TOP_MATCHES: usize = 5;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "up", "about", "into", "through", "during", "only", "just", "all", "show", "get",
    "find", "list", "return", "give", "me", "i", "want", "need", "endpoints", "api", "spec",
    "specification", "generate", "create",
];

/// Category word and the words it expands to.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("payment", &["payment", "pay", "charge", "invoice", "billing", "transaction"]),
    ("user", &["user", "account", "profile", "customer", "member"]),
    ("auth", &["auth", "login", "signin", "signup", "register", "token", "session"]),
    ("product", &["product", "item", "catalog", "inventory", "sku"]),
    ("order", &["order", "purchase", "cart", "checkout", "basket"]),
    ("search", &["search", "query", "find", "lookup", "filter"]),
    ("analytics", &["analytics", "stats", "metrics", "report", "dashboard"]),
    ("notification", &["notification", "alert", "message", "email", "sms"]),
    ("file", &["file", "upload", "download", "document", "attachment"]),
    ("admin", &["admin", "management", "config", "settings", "control"]),
];

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// An endpoint with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEndpoint {
    pub endpoint: Endpoint,
    pub score: f64,
}

/// One line of the top-matches table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopMatch {
    pub path: String,
    pub method: HttpMethod,
    pub summary: Option<String>,
    pub score: f64,
}

/// Statistics over a filtering run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSummary {
    pub query: String,
    pub threshold: f64,
    pub original_count: usize,
    pub filtered_count: usize,
    pub average_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub top_matches: Vec<TopMatch>,
}

/// Kept endpoints plus the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterReport {
    pub endpoints: Vec<ScoredEndpoint>,
    pub summary: FilterSummary,
}

/// Expanded keyword set for a query. Sorted for stable logs.
pub fn expand_keywords(query: &str) -> BTreeSet<String> {
    let lower = query.to_lowercase();
    let mut keywords = BTreeSet::new();

    for word in WORD_RE.find_iter(&lower).map(|m| m.as_str()) {
        if STOP_WORDS.contains(&word) {
            continue;
        }
        keywords.insert(word.to_string());
        for (category, related) in SYNONYMS {
            if *category == word || related.contains(&word) {
                keywords.extend(related.iter().map(|w| w.to_string()));
            }
        }
    }
    keywords
}

/// Score one endpoint against an expanded keyword set, in `[0, 1]`.
///
/// Keywords match as whole words anywhere in path, summary, description and
/// tags. Any keyword inside the path adds [`PATH_BOOST`].
pub fn score(endpoint: &Endpoint, keywords: &BTreeSet<String>) -> f64 {
    if keywords.is_empty() {
        return 1.0;
    }

    let combined = [
        endpoint.path.as_str(),
        endpoint.summary.as_deref().unwrap_or_default(),
        endpoint.description.as_deref().unwrap_or_default(),
        &endpoint.tags.join(" "),
    ]
    .join(" ")
    .to_lowercase();
    let words: HashSet<&str> = WORD_RE.find_iter(&combined).map(|m| m.as_str()).collect();

    let matches = keywords
        .iter()
        .filter(|kw| words.contains(kw.as_str()))
        .count();
    let mut score = matches as f64 / keywords.len() as f64;

    let path = endpoint.path.to_lowercase();
    if keywords.iter().any(|kw| path.contains(kw.as_str())) {
        score = (score + PATH_BOOST).min(1.0);
    }
    score
}

/// Keep endpoints scoring at least `threshold`, best first, stable on ties.
pub fn filter(endpoints: &[Endpoint], query: &str, threshold: f64) -> FilterReport {
    let keywords = expand_keywords(query);
    debug!(?keywords, "expanded query");

    let mut kept: Vec<ScoredEndpoint> = endpoints
        .iter()
        .map(|e| ScoredEndpoint {
            score: score(e, &keywords),
            endpoint: e.clone(),
        })
        .filter(|s| s.score >= threshold)
        .collect();
    kept.sort_by(|a, b| b.score.total_cmp(&a.score));

    let summary = summarize(endpoints.len(), &kept, query, threshold);
    info!(
        query,
        original = summary.original_count,
        kept = summary.filtered_count,
        threshold,
        "relevance filter applied"
    );

    FilterReport {
        endpoints: kept,
        summary,
    }
}

fn summarize(
    original_count: usize,
    kept: &[ScoredEndpoint],
    query: &str,
    threshold: f64,
) -> FilterSummary {
    let scores: Vec<f64> = kept.iter().map(|s| s.score).collect();
    let (average_score, max_score, min_score) = if scores.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            scores.iter().sum::<f64>() / scores.len() as f64,
            scores.iter().copied().fold(f64::MIN, f64::max),
            scores.iter().copied().fold(f64::MAX, f64::min),
        )
    };

    FilterSummary {
        query: query.to_string(),
        threshold,
        original_count,
        filtered_count: kept.len(),
        average_score,
        max_score,
        min_score,
        top_matches: kept
            .iter()
            .take(TOP_MATCHES)
            .map(|s| TopMatch {
                path: s.endpoint.path.clone(),
                method: s.endpoint.method,
                summary: s.endpoint.summary.clone(),
                score: s.score,
            })
            .collect(),
    }
}
