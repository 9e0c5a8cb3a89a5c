//! Command implementations behind the `cdx` binary.
//!
//! Each `run_*` function reads its inputs, drives one subsystem headlessly
//! and prints a plain-text report to stdout. Diagnostics go through
//! `tracing` (stderr) so stdout stays parseable.

use anyhow::{Context, Result};
use content_discovery_core::models::{ArticleRecord, FacetSelection, HeadingAnchor};
use content_discovery_core::scrollspy::{LayoutObserver, Scrollspy};
use content_discovery_core::taxonomy::{Catalog, FilterOutcome};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::assets::{injector_for, AssetRegistry};
use crate::config::Config;
use crate::index::{ArtifactFetcher, ModuleLocation};
use crate::loader::IndexLoader;
use crate::overlay::{OverlayHost, OverlaySettings, QueryOutcome, SearchOverlay};

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file: {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} file: {}", what, path.display()))
}

fn load_catalog(articles: &Path) -> Result<Catalog> {
    let records: Vec<ArticleRecord> = read_json(articles, "articles")?;
    let mut catalog = Catalog::new();
    catalog.load(records);
    Ok(catalog)
}

/// Print the category and group facets derived from an article list.
pub fn run_facets(articles: &Path) -> Result<()> {
    let catalog = load_catalog(articles)?;
    println!("Categories: {}", catalog.categories().join(", "));
    println!("Groups:     {}", catalog.groups().join(", "));
    Ok(())
}

/// Print the articles matching a facet selection.
pub fn run_filter(articles: &Path, selection: FacetSelection) -> Result<()> {
    let mut catalog = load_catalog(articles)?;
    catalog.select(selection);

    match catalog.visible() {
        FilterOutcome::NotLoaded => println!("Articles not loaded."),
        FilterOutcome::Empty => println!("No articles match"),
        FilterOutcome::Matches(records) => {
            println!("{} article{}:", records.len(), if records.len() == 1 { "" } else { "s" });
            println!();
            for record in records {
                let date = record
                    .date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "----------".to_string());
                println!("  {}  {}", date, record.title);
                match &record.group {
                    Some(group) => println!("    {} / {}", record.category, group),
                    None => println!("    {}", record.category),
                }
                if !record.read_time.is_empty() {
                    println!("    {}", record.read_time);
                }
                println!("    /{}", record.slug.trim_start_matches('/'));
            }
        }
    }
    Ok(())
}

/// Overlay host for a terminal session: there is no page to lock or focus,
/// so the effects are only traced.
struct TerminalHost;

impl OverlayHost for TerminalHost {
    fn set_scroll_lock(&self, locked: bool) {
        debug!(locked, "scroll lock");
    }

    fn attach_binding(&self, container: &str) {
        debug!(container, "binding attached");
    }

    fn focus_query(&self) {
        debug!("query focused");
    }

    fn render_degraded(&self, message: &str) {
        debug!(notice = message, "degraded notice rendered");
    }
}

/// Open the search overlay headlessly and run one query.
///
/// A missing index or missing assets is not an error: the degraded notice
/// is printed and the command succeeds.
pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    let location = ModuleLocation::resolve(&config.index);
    let loader = Arc::new(IndexLoader::new(Arc::new(ArtifactFetcher::new()), location));
    let assets = Arc::new(AssetRegistry::new(injector_for(&config.index)));

    let mut overlay = SearchOverlay::new(
        OverlaySettings::from_config(config)?,
        Arc::new(TerminalHost),
        assets,
        loader,
    );
    overlay.open();
    overlay.settle().await;

    match overlay.query(query).await {
        QueryOutcome::Results(hits) if hits.is_empty() => println!("No results."),
        QueryOutcome::Results(hits) => {
            for (i, hit) in hits.iter().enumerate() {
                match &hit.category {
                    Some(category) => {
                        println!("{}. [{:.2}] {} ({})", i + 1, hit.score, hit.title, category)
                    }
                    None => println!("{}. [{:.2}] {}", i + 1, hit.score, hit.title),
                }
                println!("    {}", hit.url);
                if !hit.excerpt.is_empty() {
                    println!("    > {}", hit.excerpt);
                }
                if let Some(image) = &hit.image {
                    println!("    image: {}", image);
                }
                for sub in &hit.sub_results {
                    println!("      - {} ({})", sub.title, sub.url);
                }
                println!();
            }
        }
        QueryOutcome::Degraded(message) => println!("{}", message),
        QueryOutcome::Pending | QueryOutcome::Closed => println!("Search is not ready."),
    }

    overlay.close();
    Ok(())
}

/// Rendered geometry of one heading anchor, in document coordinates.
#[derive(Debug, Deserialize)]
struct AnchorBox {
    slug: String,
    top: f64,
    height: f64,
}

/// Where the viewport sits when computing the active heading.
pub struct Viewport<'a> {
    pub layout: &'a Path,
    pub scroll_y: f64,
    pub height: f64,
}

/// Print the table of contents for a heading list.
pub fn run_toc(config: &Config, headings: &Path, viewport: Option<Viewport<'_>>) -> Result<()> {
    let headings: Vec<HeadingAnchor> = read_json(headings, "headings")?;

    let (boxes, scroll_y, height) = match &viewport {
        Some(v) => (
            read_json::<Vec<AnchorBox>>(v.layout, "layout")?,
            v.scroll_y,
            v.height,
        ),
        // Without a layout, every heading is rendered but none is in view.
        None => (
            headings
                .iter()
                .map(|h| AnchorBox {
                    slug: h.slug.clone(),
                    top: f64::MAX,
                    height: 0.0,
                })
                .collect(),
            0.0,
            0.0,
        ),
    };

    let observer = boxes
        .into_iter()
        .fold(LayoutObserver::new(height), |o, b| o.with_anchor(b.slug, b.top, b.height));
    let mut spy = Scrollspy::mount(headings, observer, config.scrollspy.observer_options())
        .with_scroll_offset(config.scrollspy.scroll_offset_px);

    if !spy.is_rendered() {
        println!("No headings.");
        return Ok(());
    }

    let entries = spy.observer_mut().scroll_viewport(scroll_y);
    spy.on_intersections(&entries);

    for entry in spy.entries() {
        let marker = if entry.active { '>' } else { ' ' };
        println!(
            "{} {}{}  #{}",
            marker,
            "  ".repeat(entry.indent as usize),
            entry.text,
            entry.slug
        );
    }
    Ok(())
}
