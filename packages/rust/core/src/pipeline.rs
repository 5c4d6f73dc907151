//! End-to-end run: base URL → discovery → fetch → extract → canonicalize → filter → coverage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use apiscout_content::{is_thin_shell, normalize, normalize_html};
use apiscout_crawler::{Fetcher, Renderer};
use apiscout_discovery::Discovery;
use apiscout_extraction::{Extractor, StructuredExtractor};
use apiscout_shared::{
    ApiScoutError, AppConfig, DiscoveryConfig, DocumentContent, ExtractionConfig,
    ExtractionResult, Result, RunId, content_digest,
};
use apiscout_storage::{CachedBody, ResultCache};

use crate::canonicalize::{self, CanonicalApi};
use crate::coverage::CoverageReport;
use crate::relevance::{self, FilterReport};

/// Relevance threshold used when none is configured.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Static configuration for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub discovery: DiscoveryConfig,
    pub extraction: ExtractionConfig,
    /// URLs that replace discovery when non-empty.
    pub force_doc_urls: Vec<String>,
    pub http_cache: bool,
    pub extraction_cache: bool,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            discovery: DiscoveryConfig::from(config),
            extraction: ExtractionConfig::from(config),
            force_doc_urls: config.force_doc_urls.clone(),
            http_cache: config.cache.enable_http_cache,
            extraction_cache: config.cache.enable_extraction_cache,
        }
    }
}

/// Collaborators injected into the pipeline.
#[derive(Clone)]
pub struct PipelineDeps {
    pub fetcher: Arc<dyn Fetcher>,
    pub renderer: Option<Arc<dyn Renderer>>,
    pub model: Arc<dyn StructuredExtractor>,
    pub cache: Option<Arc<ResultCache>>,
}

/// Per-run options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Documentation URLs to use instead of discovery.
    pub doc_urls: Vec<String>,
    /// Free-text relevance query. Blank means no filtering.
    pub query: Option<String>,
    pub threshold: f64,
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            doc_urls: Vec::new(),
            query: None,
            threshold: DEFAULT_THRESHOLD,
            cancel: CancellationToken::new(),
        }
    }
}

/// How a run ended. The non-`Completed` states are empty results, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    NoDocumentation,
    NoContent,
    NoEndpoints,
}

impl RunStatus {
    /// User-facing explanation of an empty state.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NoDocumentation => "no API documentation pages were found",
            Self::NoContent => "documentation pages were found but none could be fetched",
            Self::NoEndpoints => "no endpoints could be extracted from the documentation",
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub run_id: RunId,
    pub status: RunStatus,
    pub doc_urls: Vec<String>,
    pub documents: Vec<DocumentContent>,
    pub canonical: CanonicalApi,
    pub filtered: Option<FilterReport>,
    /// Computed over the canonical endpoints, before filtering.
    pub coverage: CoverageReport,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each documentation page is fetched (or skipped).
    fn page_fetched(&self, url: &str, current: usize, total: usize);
    /// Called as each document's extraction result is collected.
    fn document_extracted(&self, url: &str, endpoints: usize, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, output: &PipelineOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _current: usize, _total: usize) {}
    fn document_extracted(&self, _url: &str, _endpoints: usize, _current: usize, _total: usize) {}
    fn done(&self, _output: &PipelineOutput) {}
}

/// The pipeline coordinator.
pub struct Pipeline {
    config: PipelineConfig,
    deps: PipelineDeps,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, deps: PipelineDeps) -> Self {
        Self { config, deps }
    }

    /// Run the full pipeline for `base_url`.
    ///
    /// 1. Discovery (skipped when doc URLs are given)
    /// 2. Fetch and normalize, rendering thin shells
    /// 3. Bounded-concurrency extraction
    /// 4. Canonicalize
    /// 5. Relevance filter (when a query is given)
    /// 6. Coverage
    ///
    /// Remote failures only shrink the result. Errors are returned for an
    /// invalid base URL or an unusable configuration.
    #[instrument(skip_all, fields(url = %base_url))]
    pub async fn run(
        &self,
        base_url: &str,
        options: &RunOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutput> {
        let start = Instant::now();
        let base = Url::parse(base_url).map_err(|e| {
            ApiScoutError::validation(format!("invalid base URL '{base_url}': {e}"))
        })?;

        let mut output = PipelineOutput {
            run_id: RunId::new(),
            status: RunStatus::Completed,
            doc_urls: Vec::new(),
            documents: Vec::new(),
            canonical: CanonicalApi::default(),
            filtered: None,
            coverage: CoverageReport::default(),
            elapsed: Duration::ZERO,
            cancelled: false,
        };
        info!(run_id = %output.run_id, "starting pipeline");

        // --- Phase 1: Discovery ---
        let doc_urls = self.doc_urls(&base, options, progress).await?;
        output.doc_urls = doc_urls.iter().map(Url::to_string).collect();
        if doc_urls.is_empty() {
            output.cancelled = options.cancel.is_cancelled();
            return Ok(self.finish(output, RunStatus::NoDocumentation, start, progress));
        }

        // --- Phase 2: Fetch and normalize ---
        progress.phase("Fetching documentation");
        let (documents, cancelled) = self.fetch_documents(&doc_urls, &options.cancel, progress).await;
        output.cancelled |= cancelled;
        if documents.is_empty() {
            return Ok(self.finish(output, RunStatus::NoContent, start, progress));
        }

        // --- Phase 3: Extraction ---
        progress.phase("Extracting endpoints");
        let (results, cancelled) = self
            .extract_documents(&documents, &options.cancel, progress)
            .await;
        output.cancelled |= cancelled;
        output.documents = documents;

        // --- Phase 4: Canonicalize ---
        progress.phase("Merging results");
        let non_empty: Vec<ExtractionResult> = results
            .into_iter()
            .zip(&output.documents)
            .filter_map(|(result, doc)| {
                if result.endpoints.is_empty() {
                    debug!(url = %doc.url, "no endpoints in document");
                    None
                } else {
                    Some(result)
                }
            })
            .collect();
        output.canonical = canonicalize::merge(&non_empty);
        if output.canonical.endpoints.is_empty() {
            return Ok(self.finish(output, RunStatus::NoEndpoints, start, progress));
        }

        // --- Phase 5: Relevance filter ---
        if let Some(query) = options.query.as_deref().filter(|q| !q.trim().is_empty()) {
            progress.phase("Filtering endpoints");
            output.filtered = Some(relevance::filter(
                &output.canonical.endpoints,
                query,
                options.threshold,
            ));
        }

        // --- Phase 6: Coverage ---
        output.coverage = CoverageReport::analyze(&output.canonical.endpoints);

        Ok(self.finish(output, RunStatus::Completed, start, progress))
    }

    async fn doc_urls(
        &self,
        base: &Url,
        options: &RunOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<Url>> {
        let given = if options.doc_urls.is_empty() {
            &self.config.force_doc_urls
        } else {
            &options.doc_urls
        };

        if !given.is_empty() {
            info!(count = given.len(), "using provided documentation URLs");
            let urls = given
                .iter()
                .filter_map(|raw| match Url::parse(raw) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(url = %raw, error = %e, "skipping invalid documentation URL");
                        None
                    }
                })
                .collect();
            return Ok(urls);
        }

        if options.cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        progress.phase("Discovering documentation");
        let discovery = Discovery::new(Arc::clone(&self.deps.fetcher), self.config.discovery.clone())?;
        Ok(discovery.discover(base).await)
    }

    /// Fetch pages one at a time with the rate-limit delay between network requests.
    async fn fetch_documents(
        &self,
        urls: &[Url],
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> (Vec<DocumentContent>, bool) {
        let mut documents = Vec::new();
        let mut fetched_any = false;

        for (i, url) in urls.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(remaining = urls.len() - i, "cancelled before fetching");
                return (documents, true);
            }

            let body = match self.cached_body(url).await {
                Some(body) => Some(body),
                None => {
                    if fetched_any && !self.config.discovery.rate_limit.is_zero() {
                        tokio::time::sleep(self.config.discovery.rate_limit).await;
                    }
                    fetched_any = true;
                    self.fetch_body(url).await
                }
            };

            if let Some(body) = body {
                let doc = self.to_document(url, &body).await;
                if doc.text.trim().is_empty() && doc.code_samples.is_empty() {
                    warn!(url = %url, "page has no usable content");
                } else {
                    documents.push(doc);
                }
            }
            progress.page_fetched(url.as_str(), i + 1, urls.len());
        }

        (documents, false)
    }

    async fn cached_body(&self, url: &Url) -> Option<CachedBody> {
        let cache = self.http_cache()?;
        match cache.get_http(&content_digest(url.as_str())).await {
            Ok(Some(body)) => {
                debug!(url = %url, "page served from cache");
                Some(body)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(url = %url, error = %e, "page cache read failed");
                None
            }
        }
    }

    async fn fetch_body(&self, url: &Url) -> Option<CachedBody> {
        let response = match self.deps.fetcher.get(url).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "fetch failed");
                return None;
            }
        };
        if !response.is_success() {
            warn!(url = %url, status = response.status, "fetch returned non-success status");
            return None;
        }

        let body = CachedBody {
            status: response.status,
            content_type: response.content_type,
            body: response.body,
        };
        if let Some(cache) = self.http_cache() {
            if let Err(e) = cache.set_http(&content_digest(url.as_str()), &body).await {
                warn!(url = %url, error = %e, "page cache write failed");
            }
        }
        Some(body)
    }

    /// Normalize a body, re-rendering thin shells. A failed render keeps the thin content.
    async fn to_document(&self, url: &Url, body: &CachedBody) -> DocumentContent {
        let content = normalize(url.as_str(), &body.body, body.content_type.as_deref());

        let Some(renderer) = &self.deps.renderer else {
            return content;
        };
        let is_json = body
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        if is_json || !is_thin_shell(&body.body, &content, &self.config.discovery.policy) {
            return content;
        }

        info!(url = %url, chars = content.text.len(), "thin shell, rendering");
        match renderer.render(url).await {
            Ok(html) => normalize_html(url.as_str(), &html),
            Err(e) => {
                warn!(url = %url, error = %e, "render failed, keeping static content");
                content
            }
        }
    }

    /// Extract each document under a semaphore. Results come back in document order.
    async fn extract_documents(
        &self,
        documents: &[DocumentContent],
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> (Vec<ExtractionResult>, bool) {
        let cache = if self.config.extraction_cache {
            self.deps.cache.clone()
        } else {
            None
        };
        let extractor = Arc::new(Extractor::new(
            Arc::clone(&self.deps.model),
            cache,
            self.config.extraction.clone(),
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.extraction.max_concurrent_calls.max(1)));

        let mut handles = Vec::with_capacity(documents.len());
        let mut cancelled = false;
        for doc in documents {
            if cancel.is_cancelled() {
                info!(
                    remaining = documents.len() - handles.len(),
                    "cancelled before extraction"
                );
                cancelled = true;
                break;
            }

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(error = %e, "extraction semaphore closed");
                    break;
                }
            };
            let extractor = Arc::clone(&extractor);
            let doc = doc.clone();
            handles.push(tokio::spawn(async move {
                let result = extractor.extract(&doc).await;
                drop(permit);
                result
            }));
        }

        let total = handles.len();
        let mut results = Vec::with_capacity(total);
        for (i, (handle, doc)) in handles.into_iter().zip(documents).enumerate() {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(url = %doc.url, error = %e, "extraction task failed");
                    ExtractionResult::empty()
                }
            };
            progress.document_extracted(&doc.url, result.endpoints.len(), i + 1, total);
            results.push(result);
        }

        (results, cancelled)
    }

    fn http_cache(&self) -> Option<&ResultCache> {
        if self.config.http_cache {
            self.deps.cache.as_deref()
        } else {
            None
        }
    }

    fn finish(
        &self,
        mut output: PipelineOutput,
        status: RunStatus,
        start: Instant,
        progress: &dyn ProgressReporter,
    ) -> PipelineOutput {
        output.status = status;
        output.elapsed = start.elapsed();

        info!(
            run_id = %output.run_id,
            status = ?output.status,
            doc_urls = output.doc_urls.len(),
            documents = output.documents.len(),
            endpoints = output.canonical.endpoints.len(),
            cancelled = output.cancelled,
            elapsed_ms = output.elapsed.as_millis() as u64,
            "pipeline complete"
        );

        progress.done(&output);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiscout_crawler::HttpFetcher;
    use apiscout_extraction::{ExtractionRequest, RecordKind, StructuredRecord};
    use apiscout_shared::{Confidence, HttpMethod};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS_HTML: &str = r#"<html><head><title>Widgets API</title></head><body>
        <main>
          <h1>Widgets API</h1>
          <p>Each endpoint takes a parameter list and returns a JSON response.</p>
          <h2>List widgets</h2>
          <p>Returns a list of widgets.</p>
          <pre><code>GET /widgets</code></pre>
        </main>
      </body></html>"#;

    /// Returns one endpoint record per call and counts calls.
    struct FakeModel {
        calls: AtomicUsize,
        records: Vec<StructuredRecord>,
    }

    impl FakeModel {
        fn widgets() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                records: vec![StructuredRecord {
                    kind: RecordKind::Endpoint,
                    input: json!({"path": "/widgets", "method": "get", "summary": "List widgets", "confidence": "medium"}),
                }],
            })
        }
    }

    #[async_trait]
    impl StructuredExtractor for FakeModel {
        async fn extract(&self, _request: &ExtractionRequest<'_>) -> Result<Vec<StructuredRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }
    }

    /// Serves a fixed DOM and counts renders.
    struct FakeRenderer {
        html: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn render(&self, _url: &Url) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.html
                .clone()
                .ok_or_else(|| ApiScoutError::Render("browser missing".into()))
        }
    }

    /// Records phase names.
    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        done: AtomicUsize,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn page_fetched(&self, _url: &str, _current: usize, _total: usize) {}
        fn document_extracted(&self, _url: &str, _e: usize, _current: usize, _total: usize) {}
        fn done(&self, _output: &PipelineOutput) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::from(&AppConfig::default());
        config.discovery.rate_limit = Duration::ZERO;
        config.discovery.min_candidates = 1;
        config.discovery.max_concurrent_requests = 4;
        config
    }

    fn deps(model: Arc<FakeModel>) -> PipelineDeps {
        PipelineDeps {
            fetcher: Arc::new(HttpFetcher::with_timeout("apiscout-test", Duration::from_secs(5)).unwrap()),
            renderer: None,
            model,
            cache: None,
        }
    }

    async fn test_cache() -> Arc<ResultCache> {
        let tmp = std::env::temp_dir().join(format!("apiscout_test_{}.db", Uuid::now_v7()));
        Arc::new(
            ResultCache::open(&tmp, Duration::from_secs(3600))
                .await
                .expect("open test db"),
        )
    }

    async fn mount_docs(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(DOCS_HTML),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn discovers_extracts_and_reports() {
        let server = MockServer::start().await;
        mount_docs(&server).await;

        let model = FakeModel::widgets();
        let pipeline = Pipeline::new(config(), deps(Arc::clone(&model)));
        let progress = RecordingProgress::default();

        let output = pipeline
            .run(&server.uri(), &RunOptions::default(), &progress)
            .await
            .unwrap();

        assert_eq!(output.status, RunStatus::Completed);
        assert_eq!(output.doc_urls, vec![format!("{}/docs", server.uri())]);
        assert_eq!(output.documents.len(), 1);
        assert!(output.documents[0].text.contains("Returns a list of widgets"));
        assert_eq!(output.documents[0].code_samples, vec!["GET /widgets".to_string()]);

        assert_eq!(output.canonical.endpoints.len(), 1);
        let endpoint = &output.canonical.endpoints[0];
        assert_eq!(endpoint.key(), ("/widgets", HttpMethod::Get));
        assert_eq!(endpoint.confidence, Confidence::Medium);

        assert_eq!(output.coverage.total_endpoints, 1);
        assert!(output.filtered.is_none());
        assert!(!output.cancelled);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(progress.done.load(Ordering::SeqCst), 1);
        assert_eq!(
            progress.phases.lock().unwrap()[0],
            "Discovering documentation"
        );
    }

    #[tokio::test]
    async fn explicit_doc_urls_skip_discovery() {
        let server = MockServer::start().await;
        mount_docs(&server).await;
        Mock::given(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
            .expect(0)
            .mount(&server)
            .await;

        let pipeline = Pipeline::new(config(), deps(FakeModel::widgets()));
        let options = RunOptions {
            doc_urls: vec![format!("{}/docs", server.uri()), "not a url".to_string()],
            query: Some("widgets".to_string()),
            ..RunOptions::default()
        };

        let output = pipeline
            .run(&server.uri(), &options, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(output.status, RunStatus::Completed);
        assert_eq!(output.doc_urls.len(), 1);
        let filtered = output.filtered.unwrap();
        assert_eq!(filtered.summary.filtered_count, 1);
        assert_eq!(filtered.endpoints[0].score, 1.0);
    }

    #[tokio::test]
    async fn nothing_found_is_an_explicit_empty_state() {
        let server = MockServer::start().await;
        let model = FakeModel::widgets();
        let pipeline = Pipeline::new(config(), deps(Arc::clone(&model)));

        let output = pipeline
            .run(&server.uri(), &RunOptions::default(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(output.status, RunStatus::NoDocumentation);
        assert!(output.canonical.endpoints.is_empty());
        assert_eq!(output.coverage, CoverageReport::default());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unfetchable_pages_are_no_content() {
        let server = MockServer::start().await;
        let pipeline = Pipeline::new(config(), deps(FakeModel::widgets()));
        let options = RunOptions {
            doc_urls: vec![format!("{}/gone", server.uri())],
            ..RunOptions::default()
        };

        let output = pipeline
            .run(&server.uri(), &options, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(output.status, RunStatus::NoContent);
    }

    #[tokio::test]
    async fn empty_extraction_is_no_endpoints() {
        let server = MockServer::start().await;
        mount_docs(&server).await;
        let model = Arc::new(FakeModel {
            calls: AtomicUsize::new(0),
            records: Vec::new(),
        });
        let pipeline = Pipeline::new(config(), deps(model));
        let options = RunOptions {
            doc_urls: vec![format!("{}/docs", server.uri())],
            ..RunOptions::default()
        };

        let output = pipeline
            .run(&server.uri(), &options, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(output.status, RunStatus::NoEndpoints);
        assert_eq!(output.documents.len(), 1);
    }

    #[tokio::test]
    async fn invalid_base_url_is_a_validation_error() {
        let pipeline = Pipeline::new(config(), deps(FakeModel::widgets()));
        let err = pipeline
            .run("not a url", &RunOptions::default(), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiScoutError::Validation { .. }));
    }

    #[tokio::test]
    async fn cancelled_run_issues_no_work() {
        let server = MockServer::start().await;
        Mock::given(path("/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DOCS_HTML))
            .expect(0)
            .mount(&server)
            .await;

        let model = FakeModel::widgets();
        let pipeline = Pipeline::new(config(), deps(Arc::clone(&model)));
        let options = RunOptions {
            doc_urls: vec![format!("{}/docs", server.uri())],
            ..RunOptions::default()
        };
        options.cancel.cancel();

        let output = pipeline
            .run(&server.uri(), &options, &SilentProgress)
            .await
            .unwrap();
        assert!(output.cancelled);
        assert_eq!(output.status, RunStatus::NoContent);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn thin_shell_is_rendered() {
        let server = MockServer::start().await;
        Mock::given(path("/app"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(r#"<html><body><div id="root"></div></body></html>"#),
            )
            .mount(&server)
            .await;

        let renderer = Arc::new(FakeRenderer {
            html: Some(DOCS_HTML.to_string()),
            calls: AtomicUsize::new(0),
        });
        let mut deps = deps(FakeModel::widgets());
        deps.renderer = Some(renderer.clone());
        let pipeline = Pipeline::new(config(), deps);
        let options = RunOptions {
            doc_urls: vec![format!("{}/app", server.uri())],
            ..RunOptions::default()
        };

        let output = pipeline
            .run(&server.uri(), &options, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert!(output.documents[0].text.contains("Returns a list of widgets"));
    }

    #[tokio::test]
    async fn failed_render_keeps_static_content() {
        let server = MockServer::start().await;
        Mock::given(path("/app"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><div id="root"><p>Loading the API reference</p></div></body></html>"#,
            ))
            .mount(&server)
            .await;

        let renderer = Arc::new(FakeRenderer {
            html: None,
            calls: AtomicUsize::new(0),
        });
        let mut deps = deps(FakeModel::widgets());
        deps.renderer = Some(renderer.clone());
        let pipeline = Pipeline::new(config(), deps);
        let options = RunOptions {
            doc_urls: vec![format!("{}/app", server.uri())],
            ..RunOptions::default()
        };

        let output = pipeline
            .run(&server.uri(), &options, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert!(output.documents[0].text.contains("Loading the API reference"));
        assert_eq!(output.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn second_run_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(path("/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DOCS_HTML))
            .expect(1)
            .mount(&server)
            .await;

        let model = FakeModel::widgets();
        let mut deps = deps(Arc::clone(&model));
        deps.cache = Some(test_cache().await);
        let pipeline = Pipeline::new(config(), deps);
        let options = RunOptions {
            doc_urls: vec![format!("{}/docs", server.uri())],
            ..RunOptions::default()
        };

        let first = pipeline.run(&server.uri(), &options, &SilentProgress).await.unwrap();
        let second = pipeline.run(&server.uri(), &options, &SilentProgress).await.unwrap();

        assert_eq!(first.canonical, second.canonical);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn extraction_results_keep_document_order() {
        let server = MockServer::start().await;
        for name in ["a", "b", "c", "d"] {
            Mock::given(path(format!("/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                    "<html><body><main><p>Reference page {name}.</p></main></body></html>"
                )))
                .mount(&server)
                .await;
        }

        let mut config = config();
        config.extraction.max_concurrent_calls = 2;
        let pipeline = Pipeline::new(config, deps(FakeModel::widgets()));
        let options = RunOptions {
            doc_urls: ["a", "b", "c", "d"]
                .iter()
                .map(|n| format!("{}/{n}", server.uri()))
                .collect(),
            ..RunOptions::default()
        };

        let output = pipeline.run(&server.uri(), &options, &SilentProgress).await.unwrap();
        let urls: Vec<&str> = output.documents.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(urls, options.doc_urls.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(output.canonical.endpoints.len(), 1);
    }
}
