//! Artifact fetching
//!
//! Raw text access to the static artifact endpoints behind the
//! [`ArtifactFetcher`] trait, so the resolver and assembler can be
//! exercised against an in-memory tree in tests.

use async_trait::async_trait;
use tracing::debug;

use crate::types::{Result, TallyError};

/// Fetches artifact bodies by path relative to the artifact base.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Fetch an artifact as text. Errors carry the upstream status or
    /// message for the retry chain to surface.
    async fn fetch_text(&self, path: &str) -> Result<String>;
}

/// reqwest-backed fetcher over an artifact base URL.
pub struct HttpArtifactFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpArtifactFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch_text(&self, path: &str) -> Result<String> {
        let url = self.url_for(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TallyError::Artifact {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TallyError::Artifact {
                path: path.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let body = response.text().await.map_err(|e| TallyError::Artifact {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        debug!(path = path, bytes = body.len(), "Fetched artifact");
        Ok(body)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory artifact tree for resolver/assembler tests.

    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fetcher over a fixed path → body map, counting fetches per path.
    #[derive(Default)]
    pub struct MemoryFetcher {
        files: DashMap<String, String>,
        fetches: AtomicU64,
    }

    impl MemoryFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, path: &str, body: impl Into<String>) {
            self.files.insert(path.to_string(), body.into());
        }

        pub fn fetch_count(&self) -> u64 {
            self.fetches.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl ArtifactFetcher for MemoryFetcher {
        async fn fetch_text(&self, path: &str) -> Result<String> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            self.files
                .get(path)
                .map(|body| body.clone())
                .ok_or_else(|| TallyError::Artifact {
                    path: path.to_string(),
                    message: "HTTP 404 Not Found".to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joining_normalizes_slashes() {
        let fetcher = HttpArtifactFetcher::new("http://host/artifacts/");
        assert_eq!(
            fetcher.url_for("/figures/summary.json"),
            "http://host/artifacts/figures/summary.json"
        );
    }
}
