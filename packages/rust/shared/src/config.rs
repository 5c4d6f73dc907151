//! Application configuration for apiscout.
//!
//! User config lives at `~/.apiscout/apiscout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ApiScoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "apiscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".apiscout";

/// User-Agent sent with every discovery and fetch request.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "apiscout/",
    env!("CARGO_PKG_VERSION"),
    " (+API documentation discovery)"
);

// ---------------------------------------------------------------------------
// Config structs (matching apiscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Discovery and fetch limits.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// Structured-extraction model settings.
    #[serde(default)]
    pub model: ModelSection,

    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheSection,

    /// Headless browser fallback for thin-shell pages.
    #[serde(default)]
    pub render: RenderSection,

    /// Tunable classifier thresholds.
    #[serde(default)]
    pub heuristics: HeuristicsSection,

    /// Relevance filter defaults.
    #[serde(default)]
    pub filter: FilterSection,

    /// Documentation URLs that bypass discovery entirely.
    #[serde(default)]
    pub force_doc_urls: Vec<String>,
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Hard cap on pages visited by the bounded crawl.
    #[serde(default = "default_max_pages")]
    pub max_pages_per_site: usize,

    /// Maximum number of BFS rounds.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum concurrent discovery requests.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Minimum ms between a page fetch and following its links.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Probe + sitemap candidate count below which the crawl runs.
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,

    /// Whether to honour robots.txt.
    #[serde(default = "default_true")]
    pub respect_robots_txt: bool,

    /// Timeout applied to every page fetch.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// User-Agent header for all requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            max_pages_per_site: default_max_pages(),
            max_depth: default_max_depth(),
            max_concurrent_requests: default_max_concurrent_requests(),
            rate_limit_ms: default_rate_limit(),
            min_candidates: default_min_candidates(),
            respect_robots_txt: true,
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_max_pages() -> usize {
    50
}
fn default_max_depth() -> u32 {
    3
}
fn default_max_concurrent_requests() -> usize {
    5
}
fn default_rate_limit() -> u64 {
    1000
}
fn default_min_candidates() -> usize {
    3
}
fn default_true() -> bool {
    true
}
fn default_request_timeout() -> u64 {
    60
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with each extraction request.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (override for proxies and tests).
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    /// Output token budget per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Timeout applied to every model call.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,

    /// Documents extracted concurrently.
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    /// Hard cap on prompt document length, in characters.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Code samples included in the prompt.
    #[serde(default = "default_max_code_samples")]
    pub max_code_samples: usize,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_model_base_url(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_model_timeout(),
            max_concurrent_calls: default_max_concurrent_calls(),
            max_prompt_chars: default_max_prompt_chars(),
            max_code_samples: default_max_code_samples(),
        }
    }
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_model_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_model_timeout() -> u64 {
    120
}
fn default_max_concurrent_calls() -> usize {
    3
}
fn default_max_prompt_chars() -> usize {
    600_000
}
fn default_max_code_samples() -> usize {
    10
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Directory holding the cache database.
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// Entry lifetime in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Cache raw page bodies.
    #[serde(default = "default_true")]
    pub enable_http_cache: bool,

    /// Cache per-document extraction results.
    #[serde(default = "default_true")]
    pub enable_extraction_cache: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            ttl_secs: default_cache_ttl(),
            enable_http_cache: true,
            enable_extraction_cache: true,
        }
    }
}

fn default_cache_dir() -> String {
    "~/.apiscout/cache".into()
}
fn default_cache_ttl() -> u64 {
    86_400
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSection {
    /// Render thin-shell pages in a headless browser.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chromium-family executable (name on PATH or absolute path).
    #[serde(default = "default_browser")]
    pub browser: String,

    /// Wall-clock limit for one render, including retries.
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,

    /// Virtual time the page gets to settle before the DOM is dumped.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// CSS selector that must be present in the rendered DOM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_selector: Option<String>,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            enabled: true,
            browser: default_browser(),
            timeout_secs: default_render_timeout(),
            settle_ms: default_settle_ms(),
            wait_selector: None,
        }
    }
}

fn default_browser() -> String {
    "chromium".into()
}
fn default_render_timeout() -> u64 {
    60
}
fn default_settle_ms() -> u64 {
    2000
}

/// `[heuristics]` section.
///
/// These were calibrated against a handful of sites; treat them as policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicsSection {
    /// Visible text below this many characters marks an SPA shell.
    #[serde(default = "default_thin_shell_min_chars")]
    pub thin_shell_min_chars: usize,

    /// Keywords required alongside a loose URL match.
    #[serde(default = "default_loose_keyword_threshold")]
    pub loose_keyword_threshold: usize,

    /// Keywords that classify a page regardless of URL.
    #[serde(default = "default_keyword_density_threshold")]
    pub keyword_density_threshold: usize,

    /// Distinct HTTP method tokens that classify a page.
    #[serde(default = "default_http_method_threshold")]
    pub http_method_threshold: usize,

    /// Links followed per crawled page.
    #[serde(default = "default_crawl_link_limit")]
    pub crawl_link_limit: usize,
}

impl Default for HeuristicsSection {
    fn default() -> Self {
        Self {
            thin_shell_min_chars: default_thin_shell_min_chars(),
            loose_keyword_threshold: default_loose_keyword_threshold(),
            keyword_density_threshold: default_keyword_density_threshold(),
            http_method_threshold: default_http_method_threshold(),
            crawl_link_limit: default_crawl_link_limit(),
        }
    }
}

fn default_thin_shell_min_chars() -> usize {
    500
}
fn default_loose_keyword_threshold() -> usize {
    2
}
fn default_keyword_density_threshold() -> usize {
    5
}
fn default_http_method_threshold() -> usize {
    2
}
fn default_crawl_link_limit() -> usize {
    10
}

/// `[filter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSection {
    /// Minimum relevance score kept by `--filter`.
    #[serde(default = "default_filter_threshold")]
    pub threshold: f64,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            threshold: default_filter_threshold(),
        }
    }
}

fn default_filter_threshold() -> f64 {
    0.3
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Classifier thresholds shared by discovery and thin-shell detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicPolicy {
    pub thin_shell_min_chars: usize,
    pub loose_keyword_threshold: usize,
    pub keyword_density_threshold: usize,
    pub http_method_threshold: usize,
    pub crawl_link_limit: usize,
}

impl Default for HeuristicPolicy {
    fn default() -> Self {
        Self::from(&HeuristicsSection::default())
    }
}

impl From<&HeuristicsSection> for HeuristicPolicy {
    fn from(section: &HeuristicsSection) -> Self {
        Self {
            thin_shell_min_chars: section.thin_shell_min_chars,
            loose_keyword_threshold: section.loose_keyword_threshold,
            keyword_density_threshold: section.keyword_density_threshold,
            http_method_threshold: section.http_method_threshold,
            crawl_link_limit: section.crawl_link_limit,
        }
    }
}

/// HTTP client settings for the fetch capability.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.crawl.user_agent.clone(),
            timeout: Duration::from_secs(config.crawl.request_timeout_secs),
        }
    }
}

/// Runtime discovery configuration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Total pages the bounded crawl may visit.
    pub max_pages_per_site: usize,
    /// BFS rounds.
    pub max_depth: u32,
    /// Parallel requests per probe batch / crawl round.
    pub max_concurrent_requests: usize,
    /// Delay between a page fetch and its link follow-up.
    pub rate_limit: Duration,
    /// Crawl only when probe + sitemap found fewer than this.
    pub min_candidates: usize,
    /// Honour robots.txt allow/deny rules and crawl-delay.
    pub respect_robots_txt: bool,
    /// Agent name matched against robots.txt groups.
    pub user_agent: String,
    /// Classifier thresholds.
    pub policy: HeuristicPolicy,
}

impl From<&AppConfig> for DiscoveryConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_pages_per_site: config.crawl.max_pages_per_site,
            max_depth: config.crawl.max_depth,
            max_concurrent_requests: config.crawl.max_concurrent_requests.max(1),
            rate_limit: Duration::from_millis(config.crawl.rate_limit_ms),
            min_candidates: config.crawl.min_candidates,
            respect_robots_txt: config.crawl.respect_robots_txt,
            user_agent: config.crawl.user_agent.clone(),
            policy: HeuristicPolicy::from(&config.heuristics),
        }
    }
}

/// Runtime extraction configuration.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub max_concurrent_calls: usize,
    pub max_prompt_chars: usize,
    pub max_code_samples: usize,
}

impl From<&AppConfig> for ExtractionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.model.model.clone(),
            base_url: config.model.base_url.clone(),
            max_tokens: config.model.max_tokens,
            timeout: Duration::from_secs(config.model.timeout_secs),
            max_concurrent_calls: config.model.max_concurrent_calls.max(1),
            max_prompt_chars: config.model.max_prompt_chars,
            max_code_samples: config.model.max_code_samples,
        }
    }
}

/// Runtime render configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub enabled: bool,
    pub browser: String,
    pub timeout: Duration,
    pub settle: Duration,
    pub wait_selector: Option<String>,
    /// Sent as the browser's User-Agent header.
    pub user_agent: String,
}

impl From<&AppConfig> for RenderConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            enabled: config.render.enabled,
            browser: config.render.browser.clone(),
            timeout: Duration::from_secs(config.render.timeout_secs),
            settle: Duration::from_millis(config.render.settle_ms),
            wait_selector: config.render.wait_selector.clone(),
            user_agent: config.crawl.user_agent.clone(),
        }
    }
}

/// Runtime cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl: Duration,
    pub enable_http: bool,
    pub enable_extraction: bool,
}

impl CacheConfig {
    /// Location of the cache database file.
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("apiscout-cache.db")
    }
}

impl From<&AppConfig> for CacheConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            dir: expand_home(&config.cache.dir),
            ttl: Duration::from_secs(config.cache.ttl_secs),
            enable_http: config.cache.enable_http_cache,
            enable_extraction: config.cache.enable_extraction_cache,
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.apiscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ApiScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.apiscout/apiscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ApiScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ApiScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ApiScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ApiScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ApiScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the model API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.model.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ApiScoutError::config(format!(
            "model API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the model API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_pages_per_site"));
        assert!(toml_str.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.crawl.max_depth, 3);
        assert_eq!(parsed.cache.ttl_secs, 86_400);
        assert_eq!(parsed.model.max_concurrent_calls, 3);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
force_doc_urls = ["https://example.com/openapi.json"]

[crawl]
max_pages_per_site = 10

[heuristics]
thin_shell_min_chars = 200
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.crawl.max_pages_per_site, 10);
        assert_eq!(config.crawl.max_depth, 3);
        assert_eq!(config.heuristics.thin_shell_min_chars, 200);
        assert_eq!(config.heuristics.loose_keyword_threshold, 2);
        assert_eq!(config.force_doc_urls.len(), 1);
        assert!((config.filter.threshold - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let app = AppConfig::default();

        let discovery = DiscoveryConfig::from(&app);
        assert_eq!(discovery.max_pages_per_site, 50);
        assert_eq!(discovery.max_concurrent_requests, 5);
        assert_eq!(discovery.rate_limit, Duration::from_secs(1));
        assert_eq!(discovery.min_candidates, 3);
        assert_eq!(discovery.policy.keyword_density_threshold, 5);

        let extraction = ExtractionConfig::from(&app);
        assert_eq!(extraction.timeout, Duration::from_secs(120));
        assert_eq!(extraction.max_prompt_chars, 600_000);

        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.timeout, Duration::from_secs(60));
        assert!(fetch.user_agent.starts_with("apiscout/"));

        let render = RenderConfig::from(&app);
        assert_eq!(render.user_agent, fetch.user_agent);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let mut app = AppConfig::default();
        app.crawl.max_concurrent_requests = 0;
        app.model.max_concurrent_calls = 0;
        assert_eq!(DiscoveryConfig::from(&app).max_concurrent_requests, 1);
        assert_eq!(ExtractionConfig::from(&app).max_concurrent_calls, 1);
    }

    #[test]
    fn cache_dir_expands_home() {
        let mut app = AppConfig::default();
        app.cache.dir = "/var/tmp/apiscout".into();
        let cache = CacheConfig::from(&app);
        assert_eq!(cache.db_path(), PathBuf::from("/var/tmp/apiscout/apiscout-cache.db"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/x/y"), home.join("x/y"));
        }
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.model.api_key_env = "APISCOUT_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
