//! Bounded breadth-first crawl from the base URL.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use apiscout_crawler::{Fetcher, PermissionGate, extract_links, normalize_url, same_host};
use apiscout_shared::DiscoveryConfig;

use crate::heuristics::DocHeuristics;

/// What one crawled page contributed.
#[derive(Debug, Default)]
struct PageOutcome {
    is_doc: bool,
    links: Vec<Url>,
}

/// Shared state for one crawl.
pub(crate) struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    heuristics: Arc<DocHeuristics>,
    gate: Arc<PermissionGate>,
    delay: Duration,
}

impl Crawler {
    pub(crate) fn new(
        fetcher: Arc<dyn Fetcher>,
        heuristics: Arc<DocHeuristics>,
        gate: Arc<PermissionGate>,
        rate_limit: Duration,
    ) -> Self {
        // robots.txt may ask for a longer pause than configured.
        let delay = gate.crawl_delay().map_or(rate_limit, |d| d.max(rate_limit));
        Self {
            fetcher,
            heuristics,
            gate,
            delay,
        }
    }

    /// Crawl rounds from `base_url`, returning pages that passed the heuristic.
    pub(crate) async fn run(&self, base_url: &Url, config: &DiscoveryConfig) -> Vec<Url> {
        let batch_size = config.max_concurrent_requests.max(1);
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let mut queue: VecDeque<Url> = VecDeque::from([base_url.clone()]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut found = Vec::new();
        let mut round = 0u32;
        let link_limit = self.heuristics.policy().crawl_link_limit;

        while round < config.max_depth
            && !queue.is_empty()
            && visited.len() < config.max_pages_per_site
        {
            let mut batch = Vec::with_capacity(batch_size);
            while batch.len() < batch_size && visited.len() < config.max_pages_per_site {
                let Some(url) = queue.pop_front() else {
                    break;
                };
                if !visited.insert(normalize_url(&url)) {
                    continue;
                }
                if !self.gate.allows(&url) {
                    debug!(%url, "crawl disallowed by robots.txt");
                    continue;
                }
                batch.push(url);
            }

            let mut handles = Vec::with_capacity(batch.len());
            for url in batch {
                let fetcher = Arc::clone(&self.fetcher);
                let heuristics = Arc::clone(&self.heuristics);
                let semaphore = Arc::clone(&semaphore);
                let base = base_url.clone();
                let delay = self.delay;
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let outcome =
                        crawl_page(fetcher.as_ref(), &heuristics, &base, &url, link_limit).await;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    (url, outcome)
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok((url, outcome)) => {
                        if outcome.is_doc {
                            found.push(url);
                        }
                        queue.extend(
                            outcome
                                .links
                                .into_iter()
                                .filter(|link| !visited.contains(&normalize_url(link))),
                        );
                    }
                    Err(e) => warn!(error = %e, "crawl task failed"),
                }
            }

            round += 1;
        }

        info!(
            rounds = round,
            visited = visited.len(),
            found = found.len(),
            "crawl complete"
        );
        found
    }
}

/// Fetch one page, classify it, and pick its outgoing links.
///
/// Doc-like links are moved to the front before the per-page limit is applied.
async fn crawl_page(
    fetcher: &dyn Fetcher,
    heuristics: &DocHeuristics,
    base_url: &Url,
    url: &Url,
    link_limit: usize,
) -> PageOutcome {
    let response = match fetcher.get(url).await {
        Ok(r) if r.status == 200 => r,
        Ok(r) => {
            debug!(%url, status = r.status, "crawl page unavailable");
            return PageOutcome::default();
        }
        Err(e) => {
            debug!(%url, error = %e, "crawl fetch failed");
            return PageOutcome::default();
        }
    };

    let is_doc = heuristics.is_api_documentation(url, &response.body);

    let mut seen = HashSet::new();
    let (mut doc_like, other): (Vec<Url>, Vec<Url>) = extract_links(&response.body, url)
        .into_iter()
        .filter(|link| same_host(link, base_url))
        .filter(|link| seen.insert(normalize_url(link)))
        .partition(|link| heuristics.is_doc_like_url(link));
    doc_like.extend(other);
    doc_like.truncate(link_limit);

    PageOutcome {
        is_doc,
        links: doc_like,
    }
}
