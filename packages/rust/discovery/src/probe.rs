//! Path probing: conventional documentation locations fetched concurrently.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use apiscout_crawler::{Fetcher, PermissionGate};

use crate::heuristics::{DocHeuristics, PROBE_PATHS};

/// Probe every conventional path under `base_url`.
///
/// A path counts only when it answers 200 and independently passes the
/// documentation heuristic. Results keep probe-list order.
pub(crate) async fn probe_paths(
    fetcher: Arc<dyn Fetcher>,
    heuristics: Arc<DocHeuristics>,
    gate: Arc<PermissionGate>,
    base_url: &Url,
    max_concurrent: usize,
) -> Vec<Url> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut handles = Vec::with_capacity(PROBE_PATHS.len());

    for suffix in PROBE_PATHS {
        let url = match base_url.join(suffix) {
            Ok(url) => url,
            Err(e) => {
                debug!(suffix, error = %e, "cannot join probe path");
                continue;
            }
        };
        if !gate.allows(&url) {
            debug!(%url, "probe disallowed by robots.txt");
            continue;
        }

        let fetcher = Arc::clone(&fetcher);
        let heuristics = Arc::clone(&heuristics);
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            probe_one(fetcher.as_ref(), &heuristics, url).await
        }));
    }

    let mut found = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(Some(url)) => found.push(url),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "probe task failed"),
        }
    }
    found
}

async fn probe_one(fetcher: &dyn Fetcher, heuristics: &DocHeuristics, url: Url) -> Option<Url> {
    match fetcher.get(&url).await {
        Ok(response) if response.status == 200 => {
            if heuristics.is_api_documentation(&url, &response.body) {
                debug!(%url, "probe hit");
                Some(url)
            } else {
                None
            }
        }
        Ok(response) => {
            debug!(%url, status = response.status, "probe miss");
            None
        }
        Err(e) => {
            debug!(%url, error = %e, "probe failed");
            None
        }
    }
}
