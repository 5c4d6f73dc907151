//! Sitemap discovery: `<loc>` entries whose paths look like documentation.
//!
//! Sitemaps are curated by the site, so entries are accepted on URL shape
//! alone without fetching them.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};
use url::Url;

use apiscout_crawler::{Fetcher, PermissionGate, same_host};

use crate::heuristics::DocHeuristics;

/// Child sitemaps followed from a sitemap index.
const MAX_CHILD_SITEMAPS: usize = 5;

/// Well-known sitemap locations, tried before robots.txt declarations.
const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

static LOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").expect("valid loc regex"));

/// Every `<loc>` value in document order, with XML entities for `&` decoded.
pub fn extract_locs(xml: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().replace("&amp;", "&"))
        .filter(|loc| !loc.is_empty())
        .collect()
}

fn is_sitemap_index(xml: &str) -> bool {
    xml.contains("<sitemapindex")
}

/// Documentation-like URLs listed in the site's sitemap.
pub(crate) async fn from_sitemaps(
    fetcher: &dyn Fetcher,
    heuristics: &DocHeuristics,
    gate: &PermissionGate,
    base_url: &Url,
) -> Vec<Url> {
    let Some((source, xml)) = first_sitemap(fetcher, gate, base_url).await else {
        debug!(%base_url, "no sitemap found");
        return Vec::new();
    };

    let mut locs = Vec::new();
    if is_sitemap_index(&xml) {
        for child in extract_locs(&xml).into_iter().take(MAX_CHILD_SITEMAPS) {
            let Ok(child_url) = Url::parse(&child) else {
                debug!(child, "unparsable child sitemap URL");
                continue;
            };
            if let Some(body) = fetch_sitemap(fetcher, gate, &child_url).await {
                locs.extend(extract_locs(&body));
            }
        }
    } else {
        locs = extract_locs(&xml);
    }

    let accepted: Vec<Url> = locs
        .iter()
        .filter_map(|loc| Url::parse(loc).ok())
        .filter(|url| same_host(url, base_url) && heuristics.is_doc_like_url(url))
        .collect();

    info!(
        sitemap = %source,
        listed = locs.len(),
        accepted = accepted.len(),
        "sitemap parsed"
    );
    accepted
}

/// The first sitemap source answering 200.
async fn first_sitemap(
    fetcher: &dyn Fetcher,
    gate: &PermissionGate,
    base_url: &Url,
) -> Option<(Url, String)> {
    let mut sources: Vec<Url> = SITEMAP_PATHS
        .iter()
        .filter_map(|p| base_url.join(p).ok())
        .collect();
    sources.extend(gate.sitemaps().iter().filter_map(|s| Url::parse(s).ok()));

    for source in sources {
        if let Some(body) = fetch_sitemap(fetcher, gate, &source).await {
            return Some((source, body));
        }
    }
    None
}

async fn fetch_sitemap(fetcher: &dyn Fetcher, gate: &PermissionGate, url: &Url) -> Option<String> {
    if !gate.allows(url) {
        debug!(%url, "sitemap disallowed by robots.txt");
        return None;
    }
    match fetcher.get(url).await {
        Ok(response) if response.status == 200 => Some(response.body),
        Ok(response) => {
            debug!(%url, status = response.status, "sitemap unavailable");
            None
        }
        Err(e) => {
            debug!(%url, error = %e, "sitemap fetch failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiscout_crawler::{HttpFetcher, RobotsPolicy};
    use apiscout_shared::HeuristicPolicy;
    use std::time::Duration;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AGENT: &str = "apiscout-test";

    fn urlset(base: &str, paths: &[&str]) -> String {
        let entries: String = paths
            .iter()
            .map(|p| format!("  <url><loc>{base}{p}</loc></url>\n"))
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{entries}</urlset>"
        )
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::with_timeout(AGENT, Duration::from_secs(5)).unwrap()
    }

    fn heuristics() -> DocHeuristics {
        DocHeuristics::new(HeuristicPolicy::default()).unwrap()
    }

    #[test]
    fn locs_are_trimmed_and_decoded() {
        let xml = "<urlset><url><loc>\n  https://a.test/docs?x=1&amp;y=2\n</loc></url><url><LOC>https://a.test/b</LOC></url></urlset>";
        assert_eq!(
            extract_locs(xml),
            vec!["https://a.test/docs?x=1&y=2", "https://a.test/b"]
        );
    }

    #[tokio::test]
    async fn keeps_doc_like_same_host_entries() {
        let server = MockServer::start().await;
        let base = server.uri();
        let mut xml = urlset(&base, &["/", "/docs/auth", "/pricing", "/api/reference/users"]);
        xml = xml.replace(
            "</urlset>",
            "  <url><loc>https://elsewhere.test/docs</loc></url>\n</urlset>",
        );
        Mock::given(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xml))
            .mount(&server)
            .await;

        let base_url = Url::parse(&base).unwrap();
        let found = from_sitemaps(
            &fetcher(),
            &heuristics(),
            &PermissionGate::allow_all(AGENT),
            &base_url,
        )
        .await;

        let paths: Vec<&str> = found.iter().map(|u| u.path()).collect();
        assert_eq!(paths, vec!["/docs/auth", "/api/reference/users"]);
    }

    #[tokio::test]
    async fn falls_back_to_sitemap_index_and_follows_children() {
        let server = MockServer::start().await;
        let base = server.uri();
        let index = format!(
            "<sitemapindex><sitemap><loc>{base}/sitemaps/docs.xml</loc></sitemap></sitemapindex>"
        );
        Mock::given(path("/sitemap_index.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;
        Mock::given(path("/sitemaps/docs.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(urlset(&base, &["/guides/start", "/blog"])),
            )
            .mount(&server)
            .await;

        let base_url = Url::parse(&base).unwrap();
        let found = from_sitemaps(
            &fetcher(),
            &heuristics(),
            &PermissionGate::allow_all(AGENT),
            &base_url,
        )
        .await;

        assert_eq!(found, vec![base_url.join("/guides/start").unwrap()]);
    }

    #[tokio::test]
    async fn robots_declared_sitemap_is_last_resort() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(path("/maps/main.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(urlset(&base, &["/developers/keys"])),
            )
            .mount(&server)
            .await;

        let policy = RobotsPolicy::parse(&format!("Sitemap: {base}/maps/main.xml\n"));
        let gate = PermissionGate::from_policy(policy, AGENT);
        let base_url = Url::parse(&base).unwrap();

        let found = from_sitemaps(&fetcher(), &heuristics(), &gate, &base_url).await;
        assert_eq!(found, vec![base_url.join("/developers/keys").unwrap()]);
    }

    #[tokio::test]
    async fn no_sitemap_is_empty() {
        let server = MockServer::start().await;
        let base_url = Url::parse(&server.uri()).unwrap();
        let found = from_sitemaps(
            &fetcher(),
            &heuristics(),
            &PermissionGate::allow_all(AGENT),
            &base_url,
        )
        .await;
        assert!(found.is_empty());
    }
}
