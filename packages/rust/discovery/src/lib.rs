//! Documentation discovery: find pages on a site that document an HTTP API.
//!
//! Three strategies run in order:
//! 1. Path probing against conventional documentation locations
//! 2. Sitemap parsing, accepting entries on URL shape alone
//! 3. A bounded breadth-first crawl, only when the first two found too little
//!
//! Every request goes through the site's robots.txt [`PermissionGate`]. Network
//! failures on a single URL mean "not found" and never abort discovery.

mod crawl;
mod heuristics;
mod probe;
mod sitemap;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};
use url::Url;

use apiscout_crawler::{Fetcher, PermissionGate, normalize_url};
use apiscout_shared::{DiscoveryConfig, Result};

pub use heuristics::{
    DocHeuristics, DocSignal, PROBE_PATHS, http_method_count, keyword_count,
};
pub use sitemap::extract_locs;

/// The discovery engine for one configuration.
pub struct Discovery {
    fetcher: Arc<dyn Fetcher>,
    heuristics: Arc<DocHeuristics>,
    config: DiscoveryConfig,
}

impl Discovery {
    /// Build the engine. Fails only if the heuristic tables do not compile.
    pub fn new(fetcher: Arc<dyn Fetcher>, config: DiscoveryConfig) -> Result<Self> {
        let heuristics = DocHeuristics::new(config.policy.clone())?;
        Ok(Self {
            fetcher,
            heuristics: Arc::new(heuristics),
            config,
        })
    }

    pub fn heuristics(&self) -> &DocHeuristics {
        &self.heuristics
    }

    /// Candidate documentation URLs for `base_url`, de-duplicated in discovery order
    /// and capped at `max_pages_per_site`.
    ///
    /// An empty result is a valid outcome.
    #[instrument(skip_all, fields(url = %base_url))]
    pub async fn discover(&self, base_url: &Url) -> Vec<Url> {
        let gate = if self.config.respect_robots_txt {
            PermissionGate::fetch(self.fetcher.as_ref(), base_url, &self.config.user_agent).await
        } else {
            PermissionGate::allow_all(&self.config.user_agent)
        };
        let gate = Arc::new(gate);

        let mut found = CandidateSet::default();

        let probed = probe::probe_paths(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.heuristics),
            Arc::clone(&gate),
            base_url,
            self.config.max_concurrent_requests,
        )
        .await;
        info!(count = probed.len(), "path probing done");
        found.extend(probed);

        let listed =
            sitemap::from_sitemaps(self.fetcher.as_ref(), &self.heuristics, &gate, base_url).await;
        info!(count = listed.len(), "sitemap parsing done");
        found.extend(listed);

        if found.len() < self.config.min_candidates {
            info!(
                found = found.len(),
                min = self.config.min_candidates,
                "too few candidates, crawling"
            );
            let crawler = crawl::Crawler::new(
                Arc::clone(&self.fetcher),
                Arc::clone(&self.heuristics),
                Arc::clone(&gate),
                self.config.rate_limit,
            );
            found.extend(crawler.run(base_url, &self.config).await);
        }

        let mut urls = found.into_vec();
        if urls.len() > self.config.max_pages_per_site {
            debug!(
                found = urls.len(),
                max = self.config.max_pages_per_site,
                "truncating candidates to page budget"
            );
            urls.truncate(self.config.max_pages_per_site);
        }
        info!(count = urls.len(), "discovery complete");
        urls
    }
}

/// Insertion-ordered set keyed by normalized URL.
#[derive(Debug, Default)]
struct CandidateSet {
    seen: HashSet<String>,
    urls: Vec<Url>,
}

impl CandidateSet {
    fn extend(&mut self, urls: impl IntoIterator<Item = Url>) {
        for url in urls {
            if self.seen.insert(normalize_url(&url)) {
                self.urls.push(url);
            }
        }
    }

    fn len(&self) -> usize {
        self.urls.len()
    }

    fn into_vec(self) -> Vec<Url> {
        self.urls
    }
}
