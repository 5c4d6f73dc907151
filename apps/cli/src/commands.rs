//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use apiscout_core::{
    CanonicalApi, CoverageReport, FilterReport, Pipeline, PipelineConfig, PipelineDeps,
    PipelineOutput, ProgressReporter, RunOptions, RunStatus,
};
use apiscout_crawler::{BrowserRenderer, HttpFetcher, Renderer};
use apiscout_extraction::AnthropicExtractor;
use apiscout_shared::{
    AppConfig, CacheConfig, ExtractionConfig, FetchConfig, RenderConfig, init_config, load_config,
    resolve_api_key, validate_api_key,
};
use apiscout_storage::{Namespace, NamespaceStats, ResultCache};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// apiscout: find a site's API documentation and extract its endpoints.
#[derive(Parser)]
#[command(
    name = "apiscout",
    version,
    about = "Discover HTTP API documentation on a site and extract a canonical endpoint list.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Discover documentation for a site and extract its endpoints.
    Generate(GenerateArgs),

    /// Result cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct GenerateArgs {
    /// Site to scan. `https://` is assumed when no scheme is given.
    pub base_url: String,

    /// Documentation page to use instead of discovery (repeatable).
    #[arg(long = "doc-url")]
    pub doc_urls: Vec<String>,

    /// Keep only endpoints relevant to this free-text query.
    #[arg(long)]
    pub filter: Option<String>,

    /// Minimum relevance score for `--filter` (defaults to the configured threshold).
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Write JSON here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Page budget for crawling.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Link depth for crawling.
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Never launch a browser for script-rendered pages.
    #[arg(long)]
    pub no_render: bool,

    /// Bypass the result cache.
    #[arg(long)]
    pub no_cache: bool,
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Show entry counts and sizes per namespace.
    Stats,
    /// Delete cached entries.
    Clear {
        /// Only clear this namespace: http or extraction.
        #[arg(long)]
        namespace: Option<Namespace>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "apiscout=info",
        1 => "apiscout=debug",
        _ => "apiscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate(args) => cmd_generate(args).await,
        Command::Cache { action } => match action {
            CacheAction::Stats => cmd_cache_stats().await,
            CacheAction::Clear { namespace } => cmd_cache_clear(namespace).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

/// JSON document written by `generate`.
#[derive(Serialize)]
struct GenerateOutput<'a> {
    #[serde(flatten)]
    api: &'a CanonicalApi,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a FilterReport>,
}

/// Prepend `https://` when the input has no scheme.
fn with_scheme(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Apply command-line overrides on top of the loaded file config.
fn apply_overrides(config: &mut AppConfig, args: &GenerateArgs) {
    if let Some(max_pages) = args.max_pages {
        config.crawl.max_pages_per_site = max_pages;
    }
    if let Some(max_depth) = args.max_depth {
        config.crawl.max_depth = max_depth;
    }
    if args.no_render {
        config.render.enabled = false;
    }
}

async fn cmd_generate(args: GenerateArgs) -> Result<()> {
    let mut config = load_config()?;
    apply_overrides(&mut config, &args);

    // Validate API key before doing anything
    validate_api_key(&config)?;
    let api_key = resolve_api_key(&config)?;

    let base_url = with_scheme(&args.base_url);
    info!(url = %base_url, "generating endpoint list");

    let renderer: Option<Arc<dyn Renderer>> = if config.render.enabled {
        Some(Arc::new(BrowserRenderer::new(&RenderConfig::from(&config))?))
    } else {
        None
    };
    let cache = if args.no_cache {
        None
    } else {
        open_cache(&CacheConfig::from(&config)).await?
    };

    let deps = PipelineDeps {
        fetcher: Arc::new(HttpFetcher::new(&FetchConfig::from(&config))?),
        renderer,
        model: Arc::new(AnthropicExtractor::new(
            &ExtractionConfig::from(&config),
            api_key,
        )?),
        cache,
    };
    let pipeline = Pipeline::new(PipelineConfig::from(&config), deps);

    let options = RunOptions {
        doc_urls: args.doc_urls.iter().map(|u| with_scheme(u)).collect(),
        query: args.filter.clone(),
        threshold: args.threshold.unwrap_or(config.filter.threshold),
        cancel: CancellationToken::new(),
    };
    spawn_interrupt_handler(options.cancel.clone());

    let reporter = CliProgress::new();
    let output = pipeline.run(&base_url, &options, &reporter).await?;

    if output.cancelled {
        eprintln!("  Interrupted: results are partial.");
    }

    if output.status != RunStatus::Completed {
        eprintln!();
        eprintln!("  No results: {}.", output.status.message());
        eprintln!("  Time: {:.1}s", output.elapsed.as_secs_f64());
        eprintln!();
        return Ok(());
    }

    print_summary(&output);

    let json = serde_json::to_string_pretty(&GenerateOutput {
        api: &output.canonical,
        filter: output.filtered.as_ref(),
    })?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .map_err(|e| eyre!("failed to write '{}': {e}", path.display()))?;
            eprintln!("  Wrote {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Cancel the run on the first Ctrl-C. In-flight work finishes.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight work");
            cancel.cancel();
        }
    });
}

fn print_summary(output: &PipelineOutput) {
    let coverage: &CoverageReport = &output.coverage;
    let dist = coverage.confidence_distribution;

    eprintln!();
    eprintln!("  Run:        {}", output.run_id);
    if let Some(title) = &output.canonical.metadata.title {
        eprintln!("  API:        {title}");
    }
    eprintln!("  Doc pages:  {}", output.documents.len());
    eprintln!("  Endpoints:  {}", coverage.total_endpoints);
    eprintln!("  Schemes:    {}", output.canonical.security_schemes.len());
    eprintln!();
    eprintln!("  Coverage");
    eprintln!("    Parameters:  {:>5.1}%", coverage.parameter_coverage());
    eprintln!("    Request body:{:>6.1}%", coverage.body_coverage());
    eprintln!("    Responses:   {:>5.1}%", coverage.response_coverage());
    eprintln!("    Examples:    {:>5.1}%", coverage.example_coverage());
    eprintln!(
        "    Confidence:  high {} / medium {} / low {}",
        dist.high, dist.medium, dist.low
    );
    eprintln!("    Quality:     {:>5.1}/100", coverage.quality_score());

    if let Some(report) = &output.filtered {
        let summary = &report.summary;
        eprintln!();
        eprintln!(
            "  Filter \"{}\": kept {} of {} (threshold {:.2})",
            summary.query, summary.filtered_count, summary.original_count, summary.threshold
        );
        for top in &summary.top_matches {
            eprintln!("    {:.2}  {:<7} {}", top.score, top.method.as_str(), top.path);
        }
    }

    eprintln!("  Time:       {:.1}s", output.elapsed.as_secs_f64());
    eprintln!();
}

async fn open_cache(config: &CacheConfig) -> Result<Option<Arc<ResultCache>>> {
    if !config.enable_http && !config.enable_extraction {
        return Ok(None);
    }
    let cache = ResultCache::open(&config.db_path(), config.ttl).await?;
    Ok(Some(Arc::new(cache)))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {url}"));
    }

    fn document_extracted(&self, url: &str, endpoints: usize, current: usize, total: usize) {
        self.spinner.set_message(format!(
            "Extracted [{current}/{total}] {endpoints} endpoints from {url}"
        ));
    }

    fn done(&self, _output: &PipelineOutput) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// cache / config
// ---------------------------------------------------------------------------

async fn cmd_cache_stats() -> Result<()> {
    let config = CacheConfig::from(&load_config()?);
    let path = config.db_path();
    if !path.exists() {
        println!("No cache at {}", path.display());
        return Ok(());
    }

    let cache = ResultCache::open(&path, config.ttl).await?;
    let stats = cache.stats().await?;

    println!("Cache: {}", path.display());
    println!("  {:<12} {:>8} {:>8} {:>12}", "namespace", "entries", "expired", "bytes");
    print_namespace(Namespace::Http, &stats.http);
    print_namespace(Namespace::Extraction, &stats.extraction);
    Ok(())
}

fn print_namespace(namespace: Namespace, stats: &NamespaceStats) {
    println!(
        "  {:<12} {:>8} {:>8} {:>12}",
        namespace.as_str(),
        stats.entries,
        stats.expired,
        stats.bytes
    );
}

async fn cmd_cache_clear(namespace: Option<Namespace>) -> Result<()> {
    let config = CacheConfig::from(&load_config()?);
    let path = config.db_path();
    if !path.exists() {
        println!("Nothing to clear.");
        return Ok(());
    }

    let cache = ResultCache::open(&path, config.ttl).await?;
    let removed = cache.clear(namespace).await?;
    match namespace {
        Some(ns) => println!("Removed {removed} {ns} entries."),
        None => println!("Removed {removed} entries."),
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
