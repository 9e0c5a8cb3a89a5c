//! # Content Discovery Core
//!
//! Shared, WASM-safe logic for Content Discovery: article models, taxonomy
//! facets, the scrollspy navigator, the search overlay state machine, and
//! search over the index artifact.
//!
//! This crate contains no tokio, filesystem I/O, or other native-only
//! dependencies. Browser primitives (intersection observation, scrolling)
//! are reached through traits so the same logic runs in a page or in a
//! test harness.

pub mod models;
pub mod overlay;
pub mod scrollspy;
pub mod search;
pub mod taxonomy;
