//! Network-facing capabilities: fetching, robots.txt permissions, and headless rendering.
//!
//! This crate provides:
//! - [`Fetcher`] / [`HttpFetcher`]: a single GET with redirects and a timeout
//! - [`PermissionGate`]: robots.txt allow/deny and crawl-delay, allow-all on failure
//! - [`Renderer`] / [`BrowserRenderer`]: headless Chromium fallback for script-built pages
//! - [`links`]: link extraction and URL normalization for crawls

pub mod fetch;
pub mod links;
pub mod render;
pub mod robots;

pub use fetch::{FetchResponse, Fetcher, HttpFetcher};
pub use links::{extract_links, normalize_url, same_host};
pub use render::{BrowserRenderer, Renderer};
pub use robots::{PermissionGate, RobotsPolicy};
