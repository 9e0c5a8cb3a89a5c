use anyhow::{Context, Result};
use content_discovery_core::overlay::Shortcut;
use content_discovery_core::scrollspy::ObserverOptions;
use globset::Glob;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub scrollspy: ScrollspyConfig,
}

/// Where the index artifact lives once the site has been built.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Site output directory or `http(s)://` origin.
    #[serde(default = "default_base")]
    pub base: String,
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: String,
    #[serde(default = "default_entry")]
    pub entry: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            bundle_dir: default_bundle_dir(),
            entry: default_entry(),
        }
    }
}

fn default_base() -> String {
    "./dist".to_string()
}
fn default_bundle_dir() -> String {
    "pagefind".to_string()
}
fn default_entry() -> String {
    "index.json".to_string()
}

/// Stylesheet and script of the result widget, relative to `index.base`.
#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    #[serde(default = "default_stylesheet")]
    pub stylesheet: String,
    #[serde(default = "default_script")]
    pub script: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            stylesheet: default_stylesheet(),
            script: default_script(),
        }
    }
}

fn default_stylesheet() -> String {
    "pagefind/pagefind-ui.css".to_string()
}
fn default_script() -> String {
    "pagefind/pagefind-ui.js".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverlayConfig {
    /// Letter of the meta/ctrl open chord.
    #[serde(default = "default_shortcut")]
    pub shortcut: String,
    /// Container the result binding attaches to.
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_focus_delay_ms")]
    pub focus_delay_ms: u64,
    #[serde(default = "default_true")]
    pub show_sub_results: bool,
    #[serde(default)]
    pub show_images: bool,
    #[serde(default = "default_excerpt_length")]
    pub excerpt_length: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_sub_results")]
    pub max_sub_results: usize,
    /// Glob patterns; hits whose category matches any are hidden.
    #[serde(default)]
    pub exclude_categories: Vec<String>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            shortcut: default_shortcut(),
            container: default_container(),
            focus_delay_ms: default_focus_delay_ms(),
            show_sub_results: true,
            show_images: false,
            excerpt_length: default_excerpt_length(),
            page_size: default_page_size(),
            max_sub_results: default_max_sub_results(),
            exclude_categories: Vec::new(),
        }
    }
}

fn default_shortcut() -> String {
    "k".to_string()
}
fn default_container() -> String {
    "#search".to_string()
}
fn default_focus_delay_ms() -> u64 {
    50
}
fn default_true() -> bool {
    true
}
fn default_excerpt_length() -> usize {
    15
}
fn default_page_size() -> usize {
    5
}
fn default_max_sub_results() -> usize {
    3
}

impl OverlayConfig {
    /// The parsed open chord. Only valid after [`load_config`] validation.
    pub fn shortcut(&self) -> Shortcut {
        Shortcut::new(self.shortcut.chars().next().unwrap_or('k'))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrollspyConfig {
    #[serde(default = "default_top_margin_px")]
    pub top_margin_px: f64,
    #[serde(default = "default_bottom_fraction")]
    pub bottom_fraction: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Space left above a heading after click navigation.
    #[serde(default = "default_scroll_offset_px")]
    pub scroll_offset_px: f64,
}

impl Default for ScrollspyConfig {
    fn default() -> Self {
        Self {
            top_margin_px: default_top_margin_px(),
            bottom_fraction: default_bottom_fraction(),
            threshold: default_threshold(),
            scroll_offset_px: default_scroll_offset_px(),
        }
    }
}

fn default_top_margin_px() -> f64 {
    100.0
}
fn default_bottom_fraction() -> f64 {
    1.0 / 3.0
}
fn default_threshold() -> f64 {
    1.0
}
fn default_scroll_offset_px() -> f64 {
    80.0
}

impl ScrollspyConfig {
    pub fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            top_margin_px: self.top_margin_px,
            bottom_fraction: self.bottom_fraction,
            threshold: self.threshold,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Loads `path` if it exists, otherwise falls back to defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate index location
    if config.index.base.trim().is_empty() {
        anyhow::bail!("index.base must not be empty");
    }
    if config.index.entry.trim().is_empty() {
        anyhow::bail!("index.entry must not be empty");
    }

    // Validate overlay
    let mut chars = config.overlay.shortcut.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {}
        _ => anyhow::bail!(
            "overlay.shortcut must be a single ASCII letter, got '{}'",
            config.overlay.shortcut
        ),
    }
    if config.overlay.excerpt_length == 0 {
        anyhow::bail!("overlay.excerpt_length must be > 0");
    }
    if config.overlay.page_size < 1 {
        anyhow::bail!("overlay.page_size must be >= 1");
    }
    for pattern in &config.overlay.exclude_categories {
        Glob::new(pattern)
            .with_context(|| format!("Invalid overlay.exclude_categories pattern: {}", pattern))?;
    }

    // Validate scrollspy
    if !(0.0..1.0).contains(&config.scrollspy.bottom_fraction) {
        anyhow::bail!("scrollspy.bottom_fraction must be in [0.0, 1.0)");
    }
    if !(config.scrollspy.threshold > 0.0 && config.scrollspy.threshold <= 1.0) {
        anyhow::bail!("scrollspy.threshold must be in (0.0, 1.0]");
    }
    if config.scrollspy.top_margin_px < 0.0 {
        anyhow::bail!("scrollspy.top_margin_px must be >= 0");
    }

    Ok(())
}
