//! # Content Discovery
//!
//! Client-side content discovery for a static blog: a full-text search
//! overlay backed by a lazily loaded index, a scrollspy table of contents,
//! and category/group filtering of the article listing.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ KeyboardHub  │──▶│ SearchOverlay│──▶│  IndexLoader  │──▶ index artifact
//! │ (⌘K / Esc)   │   │ (runtime)    │   │ (singleton)   │    (external build)
//! └──────────────┘   └──────┬───────┘   └───────────────┘
//!                           │ effects
//!                           ▼
//!                    ┌──────────────┐   ┌───────────────┐
//!                    │ OverlayHost  │   │ AssetRegistry │──▶ stylesheet + script
//!                    └──────────────┘   └───────────────┘
//! ```
//!
//! Pure logic (taxonomy, scrollspy, overlay state machine, artifact
//! search) lives in the `content-discovery-core` crate.
//!
//! ## Quick Start
//!
//! ```bash
//! cdx facets --articles articles.json
//! cdx filter --articles articles.json --category solidity
//! cdx search "storage proxy"
//! cdx toc --headings headings.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`index`] | Index module traits and the JSON artifact backend |
//! | [`loader`] | Lazy singleton index loader |
//! | [`assets`] | One-shot injection of the widget's stylesheet and script |
//! | [`binding`] | Result binding and display options |
//! | [`keyboard`] | Page-wide key listener registry |
//! | [`overlay`] | Search overlay runtime |
//! | [`commands`] | `cdx` command implementations |

pub mod assets;
pub mod binding;
pub mod commands;
pub mod config;
pub mod index;
pub mod keyboard;
pub mod loader;
pub mod overlay;
