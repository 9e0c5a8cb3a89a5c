//! Supporting assets of the result widget (stylesheet + script bundle).
//!
//! Both assets only exist after the site's production build, so a failed
//! injection is an expected outcome in development. [`AssetRegistry`]
//! guarantees each asset is requested at most once per page session and
//! that every caller sees the outcome of that one request.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::config::{AssetsConfig, IndexConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Stylesheet,
    Script,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Stylesheet => f.write_str("stylesheet"),
            AssetKind::Script => f.write_str("script"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asset {
    pub kind: AssetKind,
    /// Path relative to the site root.
    pub path: String,
}

/// The pair of assets the result widget needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSet {
    pub stylesheet: Asset,
    pub script: Asset,
}

impl AssetSet {
    pub fn from_config(config: &AssetsConfig) -> Self {
        Self {
            stylesheet: Asset {
                kind: AssetKind::Stylesheet,
                path: config.stylesheet.clone(),
            },
            script: Asset {
                kind: AssetKind::Script,
                path: config.script.clone(),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        [&self.stylesheet, &self.script].into_iter()
    }
}

/// Injects one asset into the page.
#[async_trait]
pub trait AssetInjector: Send + Sync {
    async fn inject(&self, asset: &Asset) -> Result<()>;
}

/// Resolves assets against a built site directory on disk.
pub struct FsAssetInjector {
    root: PathBuf,
}

impl FsAssetInjector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetInjector for FsAssetInjector {
    async fn inject(&self, asset: &Asset) -> Result<()> {
        let path = self.root.join(asset.path.trim_start_matches('/'));
        let meta = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Search {} not found at {}", asset.kind, path.display()))?;
        if !meta.is_file() {
            bail!("Search {} at {} is not a file", asset.kind, path.display());
        }
        Ok(())
    }
}

/// Resolves assets against a deployed site origin.
pub struct HttpAssetInjector {
    origin: String,
    client: reqwest::Client,
}

impl HttpAssetInjector {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AssetInjector for HttpAssetInjector {
    async fn inject(&self, asset: &Asset) -> Result<()> {
        let url = format!(
            "{}/{}",
            self.origin.trim_end_matches('/'),
            asset.path.trim_start_matches('/')
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch search {} from {}", asset.kind, url))?;
        if !resp.status().is_success() {
            bail!("Search {} at {} returned {}", asset.kind, url, resp.status());
        }
        Ok(())
    }
}

/// Picks the injector matching the configured site base.
pub fn injector_for(index: &IndexConfig) -> Arc<dyn AssetInjector> {
    if index.base.starts_with("http://") || index.base.starts_with("https://") {
        Arc::new(HttpAssetInjector::new(index.base.clone()))
    } else {
        Arc::new(FsAssetInjector::new(index.base.clone()))
    }
}

type PendingAsset = Shared<BoxFuture<'static, Result<(), String>>>;

/// Page-wide record of requested assets and their outcomes.
pub struct AssetRegistry {
    injector: Arc<dyn AssetInjector>,
    requested: Mutex<HashMap<Asset, PendingAsset>>,
}

impl AssetRegistry {
    pub fn new(injector: Arc<dyn AssetInjector>) -> Self {
        Self {
            injector,
            requested: Mutex::new(HashMap::new()),
        }
    }

    /// Injects every asset of `set`, requesting each at most once.
    ///
    /// Callers arriving while an asset is in flight await the same request;
    /// later callers get its stored outcome, failure included. All assets
    /// are requested even when one fails; the first failure is returned.
    pub async fn load(&self, set: &AssetSet) -> Result<()> {
        let pending: Vec<PendingAsset> = set.iter().map(|asset| self.request(asset)).collect();
        let outcomes = futures::future::join_all(pending).await;
        match outcomes.into_iter().find_map(|outcome| outcome.err()) {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(()),
        }
    }

    fn request(&self, asset: &Asset) -> PendingAsset {
        let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = requested.get(asset) {
            debug!(kind = %asset.kind, path = %asset.path, "asset already requested");
            return pending.clone();
        }

        let injector = Arc::clone(&self.injector);
        let owned = asset.clone();
        let pending = async move {
            match injector.inject(&owned).await {
                Ok(()) => {
                    debug!(kind = %owned.kind, path = %owned.path, "asset injected");
                    Ok(())
                }
                Err(e) => {
                    warn!(kind = %owned.kind, path = %owned.path, error = %e, "asset injection failed");
                    Err(format!("{:#}", e))
                }
            }
        }
        .boxed()
        .shared();
        requested.insert(asset.clone(), pending.clone());
        pending
    }

    pub fn requested_count(&self) -> usize {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
