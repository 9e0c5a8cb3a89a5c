//! Result binding: the object that renders index results into the overlay.
//!
//! A page session creates at most one [`ResultBinding`]; the overlay
//! reuses it across open/close cycles.

use anyhow::{Context, Result};
use content_discovery_core::search::SearchHit;
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::OverlayConfig;
use crate::index::IndexHandle;

/// Display options passed through to the binding.
#[derive(Debug, Clone)]
pub struct BindingOptions {
    pub show_sub_results: bool,
    pub show_images: bool,
    /// Words per excerpt.
    pub excerpt_length: usize,
    /// Maximum hits shown.
    pub page_size: usize,
    pub max_sub_results: usize,
    pub exclude_categories: Vec<String>,
    exclude: GlobSet,
}

impl BindingOptions {
    pub fn from_config(config: &OverlayConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_categories {
            builder.add(
                Glob::new(pattern)
                    .with_context(|| format!("Invalid category exclusion pattern: {}", pattern))?,
            );
        }
        Ok(Self {
            show_sub_results: config.show_sub_results,
            show_images: config.show_images,
            excerpt_length: config.excerpt_length,
            page_size: config.page_size,
            max_sub_results: config.max_sub_results,
            exclude_categories: config.exclude_categories.clone(),
            exclude: builder.build()?,
        })
    }

    fn excluded(&self, category: Option<&str>) -> bool {
        category.is_some_and(|c| self.exclude.is_match(c))
    }

    /// Applies the display options to raw index hits.
    pub fn apply(&self, hits: Vec<SearchHit>) -> Vec<SearchHit> {
        hits.into_iter()
            .filter(|hit| !self.excluded(hit.category.as_deref()))
            .take(self.page_size)
            .map(|mut hit| {
                hit.excerpt = trim_words(&hit.excerpt, self.excerpt_length);
                if !self.show_images {
                    hit.image = None;
                }
                if self.show_sub_results {
                    hit.sub_results.truncate(self.max_sub_results);
                    for sub in &mut hit.sub_results {
                        sub.excerpt = trim_words(&sub.excerpt, self.excerpt_length);
                    }
                } else {
                    hit.sub_results.clear();
                }
                hit
            })
            .collect()
    }
}

fn trim_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }
    format!("{}…", words[..max_words].join(" "))
}

/// Renders query results for the overlay container.
#[derive(Debug)]
pub struct ResultBinding {
    container: String,
    options: BindingOptions,
    handle: IndexHandle,
}

impl ResultBinding {
    pub fn new(container: impl Into<String>, options: BindingOptions, handle: IndexHandle) -> Self {
        Self {
            container: container.into(),
            options,
            handle,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let hits = self.handle.search(query).await?;
        Ok(self.options.apply(hits))
    }
}
