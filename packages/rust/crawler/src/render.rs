//! Render fallback: materialize script-built pages in a headless browser.
//!
//! Each render spawns a fresh Chromium-family process with its own throwaway
//! profile directory, asks it to dump the DOM after a virtual-time budget,
//! and tears everything down afterwards.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use apiscout_shared::{ApiScoutError, RenderConfig, Result};

/// Renders attempted while waiting for `wait_selector`.
const MAX_ATTEMPTS: u32 = 3;

/// Anything that can turn a URL into post-script HTML.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<String>;
}

/// Headless Chromium via `--dump-dom`.
#[derive(Debug)]
pub struct BrowserRenderer {
    browser: String,
    timeout: Duration,
    settle: Duration,
    wait_selector: Option<(String, Selector)>,
    user_agent: String,
}

impl BrowserRenderer {
    /// Fails on an unparsable `wait_selector`.
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let wait_selector = match &config.wait_selector {
            Some(raw) => {
                let selector = Selector::parse(raw).map_err(|e| {
                    ApiScoutError::config(format!("invalid render wait_selector '{raw}': {e:?}"))
                })?;
                Some((raw.clone(), selector))
            }
            None => None,
        };

        Ok(Self {
            browser: config.browser.clone(),
            timeout: config.timeout,
            settle: config.settle,
            wait_selector,
            user_agent: config.user_agent.clone(),
        })
    }

    /// Run the browser once and return whatever DOM it printed.
    async fn dump_dom(&self, url: &Url, budget: Duration, remaining: Duration) -> Result<String> {
        let profile = ProfileDir::create()?;

        let mut command = Command::new(&self.browser);
        command
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg(format!("--user-agent={}", self.user_agent))
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg(format!("--virtual-time-budget={}", budget.as_millis()))
            .arg("--dump-dom")
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            ApiScoutError::Render(format!(
                "failed to launch browser: {e}. Is `{}` installed?",
                self.browser
            ))
        })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(remaining, child.wait_with_output())
            .await
            .map_err(|_| ApiScoutError::Render(format!("{url}: render timed out")))?
            .map_err(|e| ApiScoutError::Render(format!("{url}: browser wait failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.chars().take(300).collect();
            return Err(ApiScoutError::Render(format!(
                "{url}: browser exited with {}: {tail}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Renderer for BrowserRenderer {
    #[instrument(skip_all, fields(url = %url))]
    async fn render(&self, url: &Url) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        let mut budget = self.settle;
        let mut last_html = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let html = self.dump_dom(url, budget, remaining).await?;

            let Some((raw, selector)) = &self.wait_selector else {
                info!(bytes = html.len(), "rendered");
                return Ok(html);
            };

            if contains_selector(&html, selector) {
                info!(bytes = html.len(), attempt, "rendered");
                return Ok(html);
            }

            debug!(selector = %raw, attempt, budget_ms = budget.as_millis(), "selector not present yet");
            last_html = html;
            budget *= 2;
        }

        if last_html.is_empty() {
            return Err(ApiScoutError::Render(format!("{url}: render timed out")));
        }

        warn!("wait selector never appeared, using last render");
        Ok(last_html)
    }
}

fn contains_selector(html: &str, selector: &Selector) -> bool {
    Html::parse_document(html).select(selector).next().is_some()
}

/// Temporary browser profile, removed on drop.
struct ProfileDir(PathBuf);

impl ProfileDir {
    fn create() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("apiscout-render-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&path).map_err(|e| ApiScoutError::io(&path, e))?;
        Ok(Self(path))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            debug!(path = %self.0.display(), error = %e, "failed to remove render profile");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable shell script standing in for the browser.
    fn fake_browser(body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("apiscout-fake-browser-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("chromium");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn config(browser: &Path, wait_selector: Option<&str>) -> RenderConfig {
        RenderConfig {
            enabled: true,
            browser: browser.display().to_string(),
            timeout: Duration::from_secs(10),
            settle: Duration::from_millis(1000),
            wait_selector: wait_selector.map(str::to_string),
            user_agent: "apiscout-test/1.0".to_string(),
        }
    }

    fn url() -> Url {
        Url::parse("https://docs.example.com/app").unwrap()
    }

    #[tokio::test]
    async fn returns_dumped_dom() {
        let browser = fake_browser(r#"echo '<html><body><main>Rendered</main></body></html>'"#);
        let renderer = BrowserRenderer::new(&config(&browser, None)).unwrap();

        let html = renderer.render(&url()).await.unwrap();
        assert!(html.contains("Rendered"));
    }

    #[tokio::test]
    async fn profile_dir_is_removed() {
        // Print the profile path so the test can check it afterwards.
        let browser = fake_browser(
            r#"for arg in "$@"; do case "$arg" in --user-data-dir=*) echo "${arg#--user-data-dir=}";; esac; done"#,
        );
        let renderer = BrowserRenderer::new(&config(&browser, None)).unwrap();

        let output = renderer.render(&url()).await.unwrap();
        let profile = PathBuf::from(output.trim());
        assert!(profile.starts_with(std::env::temp_dir()));
        assert!(!profile.exists());
    }

    #[tokio::test]
    async fn passes_the_configured_user_agent() {
        let browser = fake_browser(
            r#"for arg in "$@"; do case "$arg" in --user-agent=*) echo "${arg#--user-agent=}";; esac; done"#,
        );
        let renderer = BrowserRenderer::new(&config(&browser, None)).unwrap();

        let output = renderer.render(&url()).await.unwrap();
        assert_eq!(output.trim(), "apiscout-test/1.0");
    }

    #[tokio::test]
    async fn retries_until_selector_appears() {
        // Emits the selector only once the budget has doubled twice.
        let browser = fake_browser(
            r#"for arg in "$@"; do case "$arg" in --virtual-time-budget=4000) echo '<div id="ready">ok</div>'; exit 0;; esac; done
echo '<div id="root"></div>'"#,
        );
        let renderer = BrowserRenderer::new(&config(&browser, Some("#ready"))).unwrap();

        let html = renderer.render(&url()).await.unwrap();
        assert!(html.contains("ready"));
    }

    #[tokio::test]
    async fn gives_up_with_last_render() {
        let browser = fake_browser(r#"echo '<div id="root"></div>'"#);
        let renderer = BrowserRenderer::new(&config(&browser, Some("#never"))).unwrap();

        let html = renderer.render(&url()).await.unwrap();
        assert!(html.contains("root"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let browser = fake_browser("echo boom >&2; exit 3");
        let renderer = BrowserRenderer::new(&config(&browser, None)).unwrap();

        let err = renderer.render(&url()).await.unwrap_err();
        assert!(matches!(err, ApiScoutError::Render(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn timeout_kills_the_browser() {
        let browser = fake_browser("sleep 30");
        let mut cfg = config(&browser, None);
        cfg.timeout = Duration::from_millis(300);
        let renderer = BrowserRenderer::new(&cfg).unwrap();

        let started = std::time::Instant::now();
        let err = renderer.render(&url()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let renderer = BrowserRenderer::new(&config(
            Path::new("/nonexistent/apiscout-browser"),
            None,
        ))
        .unwrap();
        let err = renderer.render(&url()).await.unwrap_err();
        assert!(err.to_string().contains("failed to launch browser"));
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let result = BrowserRenderer::new(&config(Path::new("chromium"), Some("div[")));
        assert!(matches!(result, Err(ApiScoutError::Config { .. })));
    }
}
