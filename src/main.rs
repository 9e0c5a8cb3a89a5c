//! # Content Discovery CLI (`cdx`)
//!
//! Drives the discovery subsystem headlessly against a built site: facet
//! listing, article filtering, search, and table-of-contents rendering.
//!
//! ## Usage
//!
//! ```bash
//! cdx --config ./config/cdx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cdx facets --articles <file>` | List categories and groups |
//! | `cdx filter --articles <file>` | List articles matching a category/group |
//! | `cdx search "<query>"` | Open the search overlay and run one query |
//! | `cdx toc --headings <file>` | Print the table of contents |
//!
//! Set `RUST_LOG=debug` to trace overlay and loader state transitions.

use clap::{Parser, Subcommand};
use content_discovery::commands::{self, Viewport};
use content_discovery::config;
use content_discovery_core::models::{FacetSelection, ALL};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Content discovery CLI: search, table of contents and article facets
/// for a built static site.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults. See
/// `config/cdx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cdx",
    about = "Content discovery for static sites: search overlay, scrollspy TOC and article facets",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cdx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the category and group facets of an article list.
    Facets {
        /// JSON array of article records.
        #[arg(long)]
        articles: PathBuf,
    },

    /// List the articles matching a category and group.
    ///
    /// Both facets default to `all`, which matches every article.
    Filter {
        /// JSON array of article records.
        #[arg(long)]
        articles: PathBuf,

        #[arg(long, default_value = ALL)]
        category: String,

        #[arg(long, default_value = ALL)]
        group: String,
    },

    /// Search the built site's index.
    ///
    /// Loads the index artifact and widget assets from `[index].base`. When
    /// the site has not been built, prints a notice instead of failing.
    Search {
        /// The search query string.
        query: String,
    },

    /// Print the table of contents of a document.
    ///
    /// With `--layout`, the entry in view at `--scroll-y` is marked `>`.
    Toc {
        /// JSON array of heading anchors (`slug`, `text`, `depth`).
        #[arg(long)]
        headings: PathBuf,

        /// JSON array of anchor boxes (`slug`, `top`, `height`).
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Vertical scroll position of the viewport.
        #[arg(long, default_value_t = 0.0, requires = "layout")]
        scroll_y: f64,

        /// Viewport height in pixels.
        #[arg(long, default_value_t = 900.0, requires = "layout")]
        viewport_height: f64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Facets { articles } => {
            return commands::run_facets(articles);
        }
        Commands::Filter {
            articles,
            category,
            group,
        } => {
            return commands::run_filter(articles, FacetSelection::new(category, group));
        }
        _ => {}
    }

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Search { query } => {
            commands::run_search(&cfg, &query).await?;
        }
        Commands::Toc {
            headings,
            layout,
            scroll_y,
            viewport_height,
        } => {
            let viewport = layout.as_deref().map(|layout| Viewport {
                layout,
                scroll_y,
                height: viewport_height,
            });
            commands::run_toc(&cfg, &headings, viewport)?;
        }
        Commands::Facets { .. } | Commands::Filter { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
