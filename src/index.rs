//! Search index module abstraction and the artifact-backed implementation.
//!
//! The index is produced by the site's external indexing step, after this
//! crate has been compiled. It is therefore only ever reached through a
//! [`ModuleLocation`] assembled from configuration at run time; nothing
//! here embeds or resolves the artifact at build time.
//!
//! # Lifecycle
//!
//! 1. An [`IndexFetcher`] fetches the module from its location.
//! 2. [`IndexModule::init`] prepares it for queries.
//! 3. Once the module reports [`IndexModule::is_ready`], it is wrapped in
//!    an [`IndexHandle`] and shared.
//!
//! Steps 1–2 are driven exclusively by [`IndexLoader`](crate::loader::IndexLoader).

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use content_discovery_core::search::{search_artifact, IndexArtifact, SearchHit};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::config::IndexConfig;

/// A fetched, queryable search index.
#[async_trait]
pub trait IndexModule: Send + Sync {
    /// Prepare the module for queries. Called exactly once per fetched module.
    async fn init(&self) -> Result<()>;

    /// Whether `init` has completed and queries can be served.
    fn is_ready(&self) -> bool;

    /// Run a query against the initialized index.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

/// Fetches the index module from its location.
#[async_trait]
pub trait IndexFetcher: Send + Sync {
    async fn fetch(&self, location: &ModuleLocation) -> Result<Arc<dyn IndexModule>>;
}

/// Run-time location of the index module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleLocation {
    File(PathBuf),
    Url(String),
}

impl ModuleLocation {
    /// Joins `base`, `bundle_dir` and `entry` from configuration.
    pub fn resolve(config: &IndexConfig) -> Self {
        let base = config.base.trim_end_matches('/');
        let bundle = config.bundle_dir.trim_matches('/');
        let entry = config.entry.trim_start_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            let mut url = base.to_string();
            for part in [bundle, entry] {
                if !part.is_empty() {
                    url.push('/');
                    url.push_str(part);
                }
            }
            ModuleLocation::Url(url)
        } else {
            let mut path = PathBuf::from(base);
            if !bundle.is_empty() {
                path.push(bundle);
            }
            path.push(entry);
            ModuleLocation::File(path)
        }
    }
}

impl fmt::Display for ModuleLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleLocation::File(path) => write!(f, "{}", path.display()),
            ModuleLocation::Url(url) => f.write_str(url),
        }
    }
}

/// Shared reference to the ready index. Cloning is cheap; every clone
/// refers to the same module.
#[derive(Clone)]
pub struct IndexHandle {
    module: Arc<dyn IndexModule>,
}

impl IndexHandle {
    pub(crate) fn new(module: Arc<dyn IndexModule>) -> Self {
        Self { module }
    }

    /// Readiness as reported by the module. The loader only hands out
    /// handles whose module reported ready after `init`.
    pub fn ready(&self) -> bool {
        self.module.is_ready()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.module.search(query).await
    }

    /// Whether both handles refer to the same module instance.
    pub fn ptr_eq(&self, other: &IndexHandle) -> bool {
        Arc::ptr_eq(&self.module, &other.module)
    }
}

impl fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHandle")
            .field("ready", &self.ready())
            .finish_non_exhaustive()
    }
}

/// Index module backed by the JSON artifact.
///
/// Fetching only retrieves the raw text; parsing happens in `init`.
pub struct ArtifactIndex {
    raw: String,
    parsed: OnceLock<IndexArtifact>,
}

impl ArtifactIndex {
    pub fn from_raw(raw: String) -> Self {
        Self {
            raw,
            parsed: OnceLock::new(),
        }
    }

    pub fn page_count(&self) -> Option<usize> {
        self.parsed.get().map(|a| a.pages.len())
    }
}

#[async_trait]
impl IndexModule for ArtifactIndex {
    async fn init(&self) -> Result<()> {
        if self.parsed.get().is_some() {
            return Ok(());
        }
        let artifact: IndexArtifact =
            serde_json::from_str(&self.raw).context("Index artifact is not valid JSON")?;
        let _ = self.parsed.set(artifact);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.parsed.get().is_some()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let artifact = self
            .parsed
            .get()
            .ok_or_else(|| anyhow!("Index queried before init"))?;
        Ok(search_artifact(artifact, query))
    }
}

/// Fetches the artifact from disk or over HTTP(S).
pub struct ArtifactFetcher {
    client: reqwest::Client,
}

impl ArtifactFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ArtifactFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexFetcher for ArtifactFetcher {
    async fn fetch(&self, location: &ModuleLocation) -> Result<Arc<dyn IndexModule>> {
        let raw = match location {
            ModuleLocation::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Index artifact not found at {}", path.display()))?,
            ModuleLocation::Url(url) => {
                let resp = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("Failed to fetch index artifact from {}", url))?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("Index artifact request to {} returned {}", url, status);
                }
                resp.text().await?
            }
        };
        Ok(Arc::new(ArtifactIndex::from_raw(raw)))
    }
}
