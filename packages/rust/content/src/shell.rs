//! Thin-shell detection: pages whose markup is an empty client-side app root.

use std::sync::LazyLock;

use regex::RegexSet;

use apiscout_shared::{DocumentContent, HeuristicPolicy};

/// Single-page-app markers, matched case-insensitively against raw markup.
const SPA_MARKERS: &[&str] = &[
    r#"<div\s+id=['"]root['"]"#,
    r#"<div\s+id=['"]app['"]"#,
    r"React",
    r"Vue",
    r"Angular",
    r"ng-app",
    r"data-reactroot",
];

static SPA_MARKER_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(SPA_MARKERS.iter().map(|p| format!("(?i){p}"))).expect("valid regex set")
});

/// Whether the raw markup carries any single-page-app root marker.
pub fn has_spa_markers(raw_html: &str) -> bool {
    SPA_MARKER_SET.is_match(raw_html)
}

/// A page needs rendering when it looks like an app shell and yielded little text.
pub fn is_thin_shell(raw_html: &str, content: &DocumentContent, policy: &HeuristicPolicy) -> bool {
    has_spa_markers(raw_html) && content.text.chars().count() < policy.thin_shell_min_chars
}
