//! libSQL-backed result cache.
//!
//! The [`ResultCache`] stores two kinds of values under separate namespaces:
//! raw HTTP bodies keyed by URL digest, and per-document
//! [`ExtractionResult`]s keyed by a digest of the document text.
//!
//! Expiry is evaluated on read: an entry older than the TTL reads as absent
//! but stays in the table until the next write to the same key replaces it
//! (or `clear` removes it). There is no single-flight coordination; two
//! writers racing on one key simply leave the later value.

mod migrations;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use apiscout_shared::{ApiScoutError, ExtractionResult, Result};
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// Logical partition of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Raw page bodies.
    Http,
    /// Serialized extraction results.
    Extraction,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Self::Http, Self::Extraction];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Extraction => "extraction",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ApiScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" => Ok(Self::Http),
            "extraction" => Ok(Self::Extraction),
            other => Err(ApiScoutError::validation(format!(
                "unknown cache namespace '{other}': expected 'http' or 'extraction'"
            ))),
        }
    }
}

/// A cached page fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBody {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub body: String,
}

/// Per-namespace occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceStats {
    pub entries: u64,
    pub expired: u64,
    pub bytes: u64,
}

/// Occupancy across the whole cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub http: NamespaceStats,
    pub extraction: NamespaceStats,
}

// ---------------------------------------------------------------------------
// ResultCache
// ---------------------------------------------------------------------------

/// Primary cache handle wrapping a libSQL database.
pub struct ResultCache {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    ttl: Duration,
}

impl ResultCache {
    /// Open or create a cache database at `path`.
    pub async fn open(path: &Path, ttl: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ApiScoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ApiScoutError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ApiScoutError::Storage(e.to_string()))?;

        let cache = Self { db, conn, ttl };
        cache.run_migrations().await?;
        Ok(cache)
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ApiScoutError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Raw key/value operations
    // -----------------------------------------------------------------------

    /// Fetch a live entry. Expired entries read as `None`.
    pub async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value, created_at FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace.as_str(), key],
            )
            .await
            .map_err(|e| ApiScoutError::Storage(e.to_string()))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(ApiScoutError::Storage(e.to_string())),
        };

        let value: String = row
            .get(0)
            .map_err(|e| ApiScoutError::Storage(e.to_string()))?;
        let created_at: String = row
            .get(1)
            .map_err(|e| ApiScoutError::Storage(e.to_string()))?;

        if is_expired(&created_at, self.ttl, Utc::now()) {
            debug!(%namespace, key, "cache entry expired");
            return Ok(None);
        }

        Ok(Some(value))
    }

    /// Store a value (upserts, refreshing its timestamp).
    pub async fn set(&self, namespace: Namespace, key: &str, value: &str) -> Result<()> {
        self.set_at(namespace, key, value, Utc::now()).await
    }

    async fn set_at(
        &self,
        namespace: Namespace,
        key: &str,
        value: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let created_at = created_at.to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO cache_entries (namespace, key, value, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, key) DO UPDATE SET
                   value = excluded.value,
                   created_at = excluded.created_at",
                params![namespace.as_str(), key, value, created_at.as_str()],
            )
            .await
            .map_err(|e| ApiScoutError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Delete every entry in `namespace`, or everything when `None`.
    /// Returns the number of rows removed.
    pub async fn clear(&self, namespace: Option<Namespace>) -> Result<u64> {
        let removed = match namespace {
            Some(ns) => self
                .conn
                .execute(
                    "DELETE FROM cache_entries WHERE namespace = ?1",
                    params![ns.as_str()],
                )
                .await,
            None => self.conn.execute("DELETE FROM cache_entries", params![]).await,
        }
        .map_err(|e| ApiScoutError::Storage(e.to_string()))?;

        tracing::info!(namespace = ?namespace.map(|n| n.as_str()), removed, "cache cleared");
        Ok(removed)
    }

    /// Count entries, expired entries and stored bytes per namespace.
    pub async fn stats(&self) -> Result<CacheStats> {
        let mut rows = self
            .conn
            .query(
                "SELECT namespace, created_at, length(value) FROM cache_entries",
                params![],
            )
            .await
            .map_err(|e| ApiScoutError::Storage(e.to_string()))?;

        let now = Utc::now();
        let mut stats = CacheStats::default();

        loop {
            let row = match rows.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(ApiScoutError::Storage(e.to_string())),
            };

            let namespace: String = row
                .get(0)
                .map_err(|e| ApiScoutError::Storage(e.to_string()))?;
            let created_at: String = row
                .get(1)
                .map_err(|e| ApiScoutError::Storage(e.to_string()))?;
            let bytes: u64 = row.get(2).unwrap_or(0);

            let bucket = match namespace.parse::<Namespace>() {
                Ok(Namespace::Http) => &mut stats.http,
                Ok(Namespace::Extraction) => &mut stats.extraction,
                Err(_) => continue,
            };
            bucket.entries += 1;
            bucket.bytes += bytes;
            if is_expired(&created_at, self.ttl, now) {
                bucket.expired += 1;
            }
        }

        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Typed helpers
    // -----------------------------------------------------------------------

    /// Cached extraction result for a document digest.
    ///
    /// A row that no longer deserializes is treated as a miss.
    pub async fn get_extraction(&self, digest: &str) -> Result<Option<ExtractionResult>> {
        let Some(raw) = self.get(Namespace::Extraction, digest).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                warn!(digest, error = %e, "discarding unreadable cached extraction");
                Ok(None)
            }
        }
    }

    /// Store an extraction result under a document digest.
    pub async fn set_extraction(&self, digest: &str, result: &ExtractionResult) -> Result<()> {
        let json = serde_json::to_string(result)
            .map_err(|e| ApiScoutError::Storage(format!("serialize extraction: {e}")))?;
        self.set(Namespace::Extraction, digest, &json).await
    }

    /// Cached page body for a URL digest.
    pub async fn get_http(&self, url_digest: &str) -> Result<Option<CachedBody>> {
        let Some(raw) = self.get(Namespace::Http, url_digest).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    /// Store a page body under a URL digest.
    pub async fn set_http(&self, url_digest: &str, body: &CachedBody) -> Result<()> {
        let json = serde_json::to_string(body)
            .map_err(|e| ApiScoutError::Storage(format!("serialize body: {e}")))?;
        self.set(Namespace::Http, url_digest, &json).await
    }
}

/// An entry is expired once its age reaches the TTL. Unparsable
/// timestamps count as expired.
fn is_expired(created_at: &str, ttl: Duration, now: DateTime<Utc>) -> bool {
    let Ok(created) = DateTime::parse_from_rfc3339(created_at) else {
        return true;
    };
    let age = now.signed_duration_since(created.with_timezone(&Utc));
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => age >= ttl,
        Err(_) => false,
    }
}
