//! Content normalization: raw HTML or JSON bodies into [`DocumentContent`].
//!
//! Everything here is a pure function over strings. Deciding whether a page
//! needs the render fallback ([`is_thin_shell`]) is left to the caller.

mod cleanup;
mod shell;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use apiscout_shared::DocumentContent;

pub use shell::{has_spa_markers, is_thin_shell};

/// Title given to documents that were served as JSON.
pub const JSON_TITLE: &str = "JSON API Spec";

/// Title used when a page has neither `<title>` nor `<h1>`.
pub const UNTITLED: &str = "Untitled";

/// Code blocks at or below this many characters are ignored.
const MIN_CODE_SAMPLE_CHARS: usize = 10;

/// Subtrees never included in the visible text.
const REMOVED_TAGS: &[&str] = &[
    "nav", "footer", "header", "aside", "script", "style", "noscript",
];

/// Tags whose text becomes a code sample, in collection order.
const CODE_TAGS: &[&str] = &["code", "pre"];

/// Normalize a fetched body.
///
/// A content type mentioning `json` keeps the body verbatim as both the text
/// and the only code sample. Anything else is parsed as HTML.
pub fn normalize(url: &str, body: &str, content_type: Option<&str>) -> DocumentContent {
    let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
    if is_json {
        debug!(url, "JSON body kept verbatim");
        return DocumentContent {
            url: url.to_string(),
            title: JSON_TITLE.to_string(),
            text: body.to_string(),
            code_samples: vec![body.to_string()],
        };
    }

    normalize_html(url, body)
}

/// Normalize an HTML page: title, code samples, then cleaned visible text.
pub fn normalize_html(url: &str, html: &str) -> DocumentContent {
    let doc = Html::parse_document(html);

    let title = extract_title(&doc);
    let code_samples = extract_code_samples(&doc);

    let mut parts = Vec::new();
    match content_root(&doc) {
        Some(root) => collect_text(root, &mut parts),
        None => collect_text(doc.root_element(), &mut parts),
    }
    let text = cleanup::run_pipeline(&parts.join("\n"));

    debug!(
        url,
        chars = text.len(),
        code_samples = code_samples.len(),
        "normalized page"
    );

    DocumentContent {
        url: url.to_string(),
        title,
        text,
        code_samples,
    }
}

/// `<title>`, then the first `<h1>`, then [`UNTITLED`].
fn extract_title(doc: &Html) -> String {
    for tag in ["title", "h1"] {
        let Ok(sel) = Selector::parse(tag) else {
            continue;
        };
        if let Some(el) = doc.select(&sel).next() {
            let text = el.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    UNTITLED.to_string()
}

/// Every `code` block, then every `pre` block, longer than the minimum.
///
/// Collected from the whole document before any subtree is dropped, so
/// `pre > code` yields two samples.
fn extract_code_samples(doc: &Html) -> Vec<String> {
    let mut samples = Vec::new();
    for tag in CODE_TAGS {
        let Ok(sel) = Selector::parse(tag) else {
            continue;
        };
        for el in doc.select(&sel) {
            let code = el.text().collect::<String>();
            let code = code.trim();
            if code.chars().count() > MIN_CODE_SAMPLE_CHARS {
                samples.push(code.to_string());
            }
        }
    }
    samples
}

/// The best content container that is not inside a removed subtree.
fn content_root(doc: &Html) -> Option<ElementRef<'_>> {
    static CONTENT_CLASS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"content|documentation|docs").expect("valid regex"));

    first_visible(doc, "main")
        .or_else(|| first_visible(doc, "article"))
        .or_else(|| {
            let sel = Selector::parse("div[class]").ok()?;
            doc.select(&sel).find(|el| {
                !inside_removed(el)
                    && el
                        .value()
                        .classes()
                        .any(|class| CONTENT_CLASS_RE.is_match(class))
            })
        })
        .or_else(|| first_visible(doc, "body"))
}

fn first_visible<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).find(|el| !inside_removed(el))
}

fn is_removed_tag(name: &str) -> bool {
    REMOVED_TAGS.contains(&name)
}

fn inside_removed(el: &ElementRef<'_>) -> bool {
    el.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| is_removed_tag(e.name()))
    })
}

/// Depth-first text collection, skipping removed subtrees and comments.
fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            Node::Element(el) if is_removed_tag(el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn json_is_kept_verbatim() {
        let body = r#"{"openapi": "3.0.0", "paths": {}}"#;
        let doc = normalize(
            "https://api.example.com/openapi.json",
            body,
            Some("application/json; charset=utf-8"),
        );
        assert_eq!(doc.title, JSON_TITLE);
        assert_eq!(doc.text, body);
        assert_eq!(doc.code_samples, vec![body.to_string()]);
    }

    #[test]
    fn docs_fixture() {
        let html = load_fixture("docs-page.html");
        let doc = normalize("https://docs.example.com/widgets", &html, Some("text/html"));

        assert_eq!(doc.title, "Widgets API Reference");
        assert!(doc.text.contains("Returns a list of widgets"));
        assert!(doc.text.contains("GET /widgets?limit=20"));

        // Chrome is gone.
        assert!(!doc.text.contains("Sign in to the developer portal"));
        assert!(!doc.text.contains("Gadgets"));
        assert!(!doc.text.contains("Copyright"));
        assert!(!doc.text.contains("rate limits"));
        assert!(!doc.text.contains("analytics"));
        assert!(!doc.text.contains("internal catalogue"));

        // Short navigation-style lines are dropped.
        assert!(!doc.text.lines().any(|l| l.trim() == "ok"));
        assert!(!doc.text.lines().any(|l| l.trim() == "In"));
    }

    #[test]
    fn code_samples_code_before_pre() {
        let html = load_fixture("docs-page.html");
        let doc = normalize_html("https://docs.example.com/widgets", &html);

        // `X-API-Key` is exactly 9 characters and skipped.
        assert_eq!(
            doc.code_samples,
            vec![
                "GET /widgets?limit=20".to_string(),
                "GET /widgets?limit=20".to_string(),
                r#"{"data": [{"id": "wid_123", "name": "Sprocket"}]}"#.to_string(),
            ]
        );
    }

    #[test]
    fn title_falls_back_to_h1_then_untitled() {
        let doc = normalize_html("u", "<html><body><h1> Payments </h1></body></html>");
        assert_eq!(doc.title, "Payments");

        let doc = normalize_html("u", "<html><body><p>Nothing here</p></body></html>");
        assert_eq!(doc.title, UNTITLED);
    }

    #[test]
    fn prefers_article_then_content_div() {
        let html = r#"<html><body>
            <p>Outside the article body</p>
            <article><p>Inside the article body</p></article>
        </body></html>"#;
        let doc = normalize_html("u", html);
        assert_eq!(doc.text, "Inside the article body");

        let html = r#"<html><body>
            <div class="sidebar"><p>Sidebar links here</p></div>
            <div class="page docs-body"><p>Authentication uses tokens</p></div>
        </body></html>"#;
        let doc = normalize_html("u", html);
        assert_eq!(doc.text, "Authentication uses tokens");
    }

    #[test]
    fn main_inside_nav_is_ignored() {
        let html = r#"<html><body>
            <nav><main><p>Menu entries</p></main></nav>
            <p>Body paragraph text</p>
        </body></html>"#;
        let doc = normalize_html("u", html);
        assert_eq!(doc.text, "Body paragraph text");
    }

    #[test]
    fn spa_shell_has_almost_no_text() {
        let html = load_fixture("spa-shell.html");
        let doc = normalize(
            "https://portal.example.com/",
            &html,
            Some("text/html; charset=utf-8"),
        );
        assert_eq!(doc.title, "Developer Portal");
        assert!(doc.text.is_empty());
        assert!(doc.code_samples.is_empty());
    }

    #[test]
    fn missing_content_type_means_html() {
        let doc = normalize("u", "<p>Plain paragraph text</p>", None);
        assert_eq!(doc.text, "Plain paragraph text");
    }
}
