//! Link extraction and URL normalization for discovery crawls.

use scraper::{Html, Selector};
use url::Url;

/// All followable links in `html`, resolved against `base_url`, fragments stripped.
///
/// Anchors, `javascript:`, `mailto:` and `tel:` hrefs are skipped. Order follows
/// the document; duplicates are kept for the caller to filter.
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let Ok(link_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for el in doc.select(&link_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        if let Ok(mut resolved) = base_url.join(href) {
            if resolved.scheme() != "http" && resolved.scheme() != "https" {
                continue;
            }
            resolved.set_fragment(None);
            links.push(resolved);
        }
    }

    links
}

/// Dedup key for a URL: no fragment, no trailing slash except at the root.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    if s.ends_with('/') && normalized.path() != "/" {
        s.pop();
    }
    s
}

/// Whether both URLs point at the same host (ports must match too).
pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}
