//! Artifact resolution and session caches
//!
//! A deployment can carry several build directories at once (old
//! hashed builds plus the latest), so one logical artifact path may
//! have several physical candidates. [`ArtifactStore`] scores the
//! candidates from the artifact index against the "latest build"
//! pointer, memoizes the winning path per canonical key, and layers
//! three append-only caches on top of the fetcher.
//!
//! Caches never evict within a session: artifacts are content-addressed
//! and immutable once published.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use footprint_core::parse_reference_list;

use crate::types::{Result, TallyError};

use super::fetch::ArtifactFetcher;

/// Marker directory separating build prefixes from canonical artifact
/// paths.
pub const MARKER_DIR: &str = "figures";

/// Artifact index listing every published file.
const INDEX_ARTIFACT: &str = "index.json";

/// Pointer to the most recent build.
const LATEST_BUILD_ARTIFACT: &str = "latest-build.json";

/// Score weights for candidate paths.
const SCORE_PREFERRED_BUILD: i32 = 100;
const SCORE_UNDER_MARKER: i32 = 10;
const SCORE_BARE_FILENAME: i32 = -5;

// ============================================================================
// Index / pointer schemas
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct IndexEntry {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Default, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    files: Vec<IndexEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct LatestBuild {
    #[serde(default)]
    build_hash: Option<String>,
    #[serde(default)]
    artifact_dir: Option<String>,
}

impl LatestBuild {
    /// The preferred build-root directory name, whichever field the
    /// pointer carries.
    fn preferred_root(&self) -> Option<String> {
        if let Some(ref hash) = self.build_hash {
            if !hash.is_empty() {
                return Some(hash.clone());
            }
        }
        self.artifact_dir
            .as_deref()
            .map(|dir| dir.trim_matches('/'))
            .and_then(|dir| dir.rsplit('/').next())
            .filter(|dir| !dir.is_empty())
            .map(str::to_string)
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Default)]
struct Stats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    fallback_retries: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of the store's counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactStoreStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub fallback_retries: u64,
    pub failures: u64,
}

// ============================================================================
// Artifact store
// ============================================================================

/// Session-scoped artifact access: resolution, fetching, caching.
pub struct ArtifactStore {
    fetcher: Arc<dyn ArtifactFetcher>,
    /// Canonical key → best physical path, built once per session.
    overrides: OnceCell<HashMap<String, String>>,
    json_cache: DashMap<String, Arc<Value>>,
    text_cache: DashMap<String, Arc<String>>,
    reference_cache: DashMap<String, Arc<Vec<String>>>,
    stats: Stats,
}

impl ArtifactStore {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self {
            fetcher,
            overrides: OnceCell::new(),
            json_cache: DashMap::new(),
            text_cache: DashMap::new(),
            reference_cache: DashMap::new(),
            stats: Stats::default(),
        }
    }

    /// Resolve a logical artifact path to the best physical candidate,
    /// or `None` when the index knows nothing about it.
    pub async fn resolve(&self, logical: &str) -> Option<String> {
        let key = canonical_key(logical)?;
        self.override_map().await.get(&key).cloned()
    }

    /// Fetch and parse a JSON artifact, retrying once through the
    /// resolver when the literal path fails to fetch or parse.
    pub async fn get_json(&self, path: &str) -> Result<Arc<Value>> {
        if let Some(cached) = self.json_cache.get(path) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let value = match self.fetch_json_at(path).await {
            Ok(value) => value,
            Err(original) => match self.resolved_candidate(path).await {
                Some(resolved) => {
                    self.note_retry(path, &resolved, &original);
                    match self.fetch_json_at(&resolved).await {
                        Ok(value) => value,
                        Err(retry_error) => return Err(self.note_failure(retry_error)),
                    }
                }
                None => return Err(self.note_failure(original)),
            },
        };

        let value = Arc::new(value);
        self.json_cache.insert(path.to_string(), value.clone());
        Ok(value)
    }

    /// Fetch a text artifact, retrying once through the resolver.
    pub async fn get_text(&self, path: &str) -> Result<Arc<String>> {
        if let Some(cached) = self.text_cache.get(path) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        self.fetch_text_uncounted(path).await
    }

    /// Fetch and parse a reference-list artifact. Counts one hit or
    /// miss per request even though it layers on the text cache.
    pub async fn get_reference_list(&self, path: &str) -> Result<Arc<Vec<String>>> {
        if let Some(cached) = self.reference_cache.get(path) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let body = self.fetch_text_uncounted(path).await?;
        let list = Arc::new(parse_reference_list(&body));
        self.reference_cache.insert(path.to_string(), list.clone());
        Ok(list)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> ArtifactStoreStats {
        ArtifactStoreStats {
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
            fallback_retries: self.stats.fallback_retries.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Text fetch with the resolver retry chain, without touching the
    /// hit/miss counters (callers count at their own layer).
    async fn fetch_text_uncounted(&self, path: &str) -> Result<Arc<String>> {
        if let Some(cached) = self.text_cache.get(path) {
            return Ok(cached.clone());
        }

        let body = match self.fetcher.fetch_text(path).await {
            Ok(body) => body,
            Err(original) => match self.resolved_candidate(path).await {
                Some(resolved) => {
                    self.note_retry(path, &resolved, &original);
                    match self.fetcher.fetch_text(&resolved).await {
                        Ok(body) => body,
                        Err(retry_error) => return Err(self.note_failure(retry_error)),
                    }
                }
                None => return Err(self.note_failure(original)),
            },
        };

        let body = Arc::new(body);
        self.text_cache.insert(path.to_string(), body.clone());
        Ok(body)
    }

    async fn fetch_json_at(&self, path: &str) -> Result<Value> {
        let body = self.fetcher.fetch_text(path).await?;
        serde_json::from_str(&body).map_err(|e| TallyError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// A resolver override distinct from the literal path, when one
    /// exists.
    async fn resolved_candidate(&self, path: &str) -> Option<String> {
        self.resolve(path).await.filter(|resolved| resolved != path)
    }

    fn note_retry(&self, path: &str, resolved: &str, original: &TallyError) {
        warn!(
            path = path,
            resolved = resolved,
            error = %original,
            "Artifact load failed, retrying via resolved path"
        );
        self.stats.fallback_retries.fetch_add(1, Ordering::Relaxed);
    }

    fn note_failure(&self, error: TallyError) -> TallyError {
        self.stats.failures.fetch_add(1, Ordering::Relaxed);
        error
    }

    /// Lazily built canonical-key → best-path map. Concurrent callers
    /// during the build share the same in-flight future; the index is
    /// fetched at most once per session.
    async fn override_map(&self) -> &HashMap<String, String> {
        self.overrides
            .get_or_init(|| async { self.build_override_map().await })
            .await
    }

    async fn build_override_map(&self) -> HashMap<String, String> {
        let paths = self.load_index().await;
        let preferred = self.load_latest_build().await;

        let mut best: HashMap<String, (i32, String)> = HashMap::new();
        for path in &paths {
            let Some(key) = canonical_key(path) else {
                debug!(path = %path, "Index entry has no canonical key, dropped");
                continue;
            };
            let score = score_path(path, preferred.as_deref());
            match best.get(&key) {
                // First entry wins ties: only a strictly better score replaces.
                Some((existing, _)) if *existing >= score => {}
                _ => {
                    best.insert(key, (score, path.clone()));
                }
            }
        }

        info!(
            entries = paths.len(),
            resolved = best.len(),
            preferred_build = preferred.as_deref().unwrap_or("none"),
            "Artifact override map built"
        );
        best.into_iter()
            .map(|(key, (_, path))| (key, path))
            .collect()
    }

    /// Fetch the artifact index, tolerating absence and parse failure.
    async fn load_index(&self) -> Vec<String> {
        let body = match self.fetcher.fetch_text(INDEX_ARTIFACT).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Artifact index unavailable, resolver map is empty");
                return Vec::new();
            }
        };

        let entries = serde_json::from_str::<Vec<IndexEntry>>(&body).or_else(|_| {
            serde_json::from_str::<IndexDocument>(&body).map(|document| document.files)
        });
        match entries {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| entry.path)
                .filter(|path| !path.is_empty())
                .collect(),
            Err(e) => {
                warn!(error = %e, "Artifact index failed to parse, resolver map is empty");
                Vec::new()
            }
        }
    }

    /// Fetch the latest-build pointer, tolerating absence and parse
    /// failure.
    async fn load_latest_build(&self) -> Option<String> {
        let body = match self.fetcher.fetch_text(LATEST_BUILD_ARTIFACT).await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "Latest-build pointer unavailable");
                return None;
            }
        };
        match serde_json::from_str::<LatestBuild>(&body) {
            Ok(latest) => latest.preferred_root(),
            Err(e) => {
                warn!(error = %e, "Latest-build pointer failed to parse");
                None
            }
        }
    }
}

/// Canonical key for an artifact path: the segment run after the
/// marker directory when present, else the bare filename when the path
/// has no subdirectory. Everything else is unresolvable.
fn canonical_key(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }
    if let Some(pos) = segments.iter().position(|s| *s == MARKER_DIR) {
        if pos + 1 < segments.len() {
            return Some(segments[pos + 1..].join("/"));
        }
        return None;
    }
    if segments.len() == 1 {
        return Some(segments[0].to_string());
    }
    None
}

/// Score a candidate physical path against the preferred build root.
fn score_path(path: &str, preferred_root: Option<&str>) -> i32 {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut score = 0;
    if let (Some(first), Some(preferred)) = (segments.first(), preferred_root) {
        if *first == preferred {
            score += SCORE_PREFERRED_BUILD;
        }
    }
    if segments.len() > 1 && segments[..segments.len() - 1].contains(&MARKER_DIR) {
        score += SCORE_UNDER_MARKER;
    }
    if segments.len() == 1 {
        score += SCORE_BARE_FILENAME;
    }
    score
}
