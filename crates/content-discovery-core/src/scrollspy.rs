//! Scrollspy table-of-contents navigator.
//!
//! Tracks which section of the current document is in view and exposes it
//! as the highlighted entry of a table of contents.
//!
//! # Observation model
//!
//! The navigator never polls. It registers every heading anchor with a
//! [`ViewportObserver`] (an intersection-observer style primitive supplied
//! by the host) and reacts to the [`IntersectionEntry`] batches the host
//! feeds back through [`Scrollspy::on_intersections`].
//!
//! ```text
//!  headings ──▶ Scrollspy::mount ──▶ observer.observe(slug) × N
//!                                          │
//!  scroll ──▶ host computes entries ──▶ on_intersections ──▶ active_slug
//! ```
//!
//! Watched anchors are released when the heading list changes, on
//! [`Scrollspy::unmount`], and on drop.

use std::collections::HashMap;

use crate::models::HeadingAnchor;

/// Viewport margin and threshold used for intersection detection.
///
/// The defaults bias detection toward the upper part of the viewport: an
/// anchor counts as "in view" once it sits fully between 100px below the
/// top edge and one third above the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    pub top_margin_px: f64,
    /// Fraction of the viewport height excluded at the bottom.
    pub bottom_fraction: f64,
    /// Visible fraction of the anchor required to count as intersecting.
    pub threshold: f64,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            top_margin_px: 100.0,
            bottom_fraction: 1.0 / 3.0,
            threshold: 1.0,
        }
    }
}

impl ObserverOptions {
    /// CSS `rootMargin` string for a browser `IntersectionObserver`.
    pub fn root_margin(&self) -> String {
        format!(
            "-{}px 0px -{}% 0px",
            trim_float(self.top_margin_px),
            trim_float(self.bottom_fraction * 100.0)
        )
    }

    /// Whether an anchor spanning `[top, bottom]` (viewport coordinates)
    /// intersects the observation band.
    pub fn is_intersecting(&self, top: f64, bottom: f64, viewport_height: f64) -> bool {
        let band_top = self.top_margin_px;
        let band_bottom = viewport_height * (1.0 - self.bottom_fraction);
        if band_bottom <= band_top {
            return false;
        }

        let height = (bottom - top).max(0.0);
        let visible = (bottom.min(band_bottom) - top.max(band_top)).max(0.0);
        if height == 0.0 {
            // Zero-height anchors (empty `<a id>` targets) count once inside.
            return top >= band_top && top <= band_bottom;
        }
        visible / height >= self.threshold - f64::EPSILON
    }
}

fn trim_float(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

/// One observation report for a watched anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    pub slug: String,
    pub is_intersecting: bool,
}

impl IntersectionEntry {
    pub fn entering(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            is_intersecting: true,
        }
    }

    pub fn leaving(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            is_intersecting: false,
        }
    }
}

/// Intersection-observer primitive supplied by the host.
pub trait ViewportObserver {
    /// Start watching the element whose id is `slug`.
    ///
    /// Returns `false` when no such element is rendered; the anchor is
    /// then skipped.
    fn observe(&mut self, slug: &str, options: &ObserverOptions) -> bool;

    /// Stop watching `slug`.
    fn unobserve(&mut self, slug: &str);
}

/// How smooth scrolling should be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Document scrolling surface supplied by the host.
pub trait ScrollSurface {
    /// Absolute document offset of the element whose id is `slug`.
    fn anchor_top(&self, slug: &str) -> Option<f64>;

    fn scroll_to(&mut self, top: f64, behavior: ScrollBehavior);
}

/// How the navigator is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Sidebar next to the article.
    Inline,
    /// Small viewports: the navigator is an overlay panel that closes
    /// after navigation.
    Panel,
}

/// What a click on a navigation entry did.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigateOutcome {
    /// The default anchor jump must be suppressed.
    pub prevent_default: bool,
    /// Scroll position requested, `None` if the anchor is not rendered.
    pub target_top: Option<f64>,
    pub panel_closed: bool,
}

/// A rendered table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub slug: String,
    pub text: String,
    /// Nesting level relative to the shallowest heading.
    pub indent: u8,
    pub active: bool,
}

/// Table-of-contents navigator state.
pub struct Scrollspy<O: ViewportObserver> {
    observer: O,
    options: ObserverOptions,
    scroll_offset: f64,
    headings: Vec<HeadingAnchor>,
    observed: Vec<String>,
    active_slug: Option<String>,
    panel_open: bool,
}

impl<O: ViewportObserver> Scrollspy<O> {
    /// Pixels left above a heading after click navigation, so it does not
    /// end up under the fixed top bar.
    pub const DEFAULT_SCROLL_OFFSET: f64 = 80.0;

    /// Creates the navigator and starts observing `headings`.
    pub fn mount(headings: Vec<HeadingAnchor>, observer: O, options: ObserverOptions) -> Self {
        let mut spy = Self {
            observer,
            options,
            scroll_offset: Self::DEFAULT_SCROLL_OFFSET,
            headings: Vec::new(),
            observed: Vec::new(),
            active_slug: None,
            panel_open: false,
        };
        spy.set_headings(headings);
        spy
    }

    pub fn with_scroll_offset(mut self, offset: f64) -> Self {
        self.scroll_offset = offset;
        self
    }

    /// Replaces the heading list, releasing every previously watched anchor
    /// before registering the new ones.
    pub fn set_headings(&mut self, headings: Vec<HeadingAnchor>) {
        self.release();
        self.headings = headings;
        if self
            .active_slug
            .as_deref()
            .is_some_and(|slug| !self.headings.iter().any(|h| h.slug == slug))
        {
            self.active_slug = None;
        }

        for heading in &self.headings {
            if self.observed.contains(&heading.slug) {
                continue;
            }
            if self.observer.observe(&heading.slug, &self.options) {
                self.observed.push(heading.slug.clone());
            }
        }
    }

    /// Releases all watched anchors. The navigator renders nothing afterwards.
    pub fn unmount(&mut self) {
        self.release();
        self.headings.clear();
        self.active_slug = None;
    }

    fn release(&mut self) {
        for slug in self.observed.drain(..) {
            self.observer.unobserve(&slug);
        }
    }

    /// Applies a batch of observation reports. The last intersecting entry
    /// for a known heading wins.
    pub fn on_intersections(&mut self, entries: &[IntersectionEntry]) {
        for entry in entries {
            if !entry.is_intersecting {
                continue;
            }
            if self.headings.iter().any(|h| h.slug == entry.slug) {
                self.active_slug = Some(entry.slug.clone());
            }
        }
    }

    pub fn active_slug(&self) -> Option<&str> {
        self.active_slug.as_deref()
    }

    pub fn headings(&self) -> &[HeadingAnchor] {
        &self.headings
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Number of anchors currently watched.
    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// An empty heading list renders nothing.
    pub fn is_rendered(&self) -> bool {
        !self.headings.is_empty()
    }

    pub fn open_panel(&mut self) {
        self.panel_open = true;
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// Handles a click on the entry for `slug`.
    pub fn navigate<S: ScrollSurface>(
        &mut self,
        slug: &str,
        surface: &mut S,
        presentation: Presentation,
    ) -> NavigateOutcome {
        let target_top = surface
            .anchor_top(slug)
            .map(|top| (top - self.scroll_offset).max(0.0));
        if let Some(top) = target_top {
            surface.scroll_to(top, ScrollBehavior::Smooth);
        }

        let panel_closed = presentation == Presentation::Panel && self.panel_open;
        if presentation == Presentation::Panel {
            self.panel_open = false;
        }

        NavigateOutcome {
            prevent_default: true,
            target_top,
            panel_closed,
        }
    }

    /// Entries to render, indented relative to the shallowest heading.
    pub fn entries(&self) -> Vec<TocEntry> {
        let min_depth = self.headings.iter().map(|h| h.depth).min().unwrap_or(0);
        self.headings
            .iter()
            .map(|h| TocEntry {
                slug: h.slug.clone(),
                text: h.text.clone(),
                indent: h.depth.saturating_sub(min_depth),
                active: self.active_slug.as_deref() == Some(h.slug.as_str()),
            })
            .collect()
    }
}

impl<O: ViewportObserver> Drop for Scrollspy<O> {
    fn drop(&mut self) {
        self.release();
    }
}

/// In-process intersection primitive over known anchor geometry.
///
/// Stands in for the browser observer wherever element positions are
/// known up front (CLI rendering, tests). Scrolling reports transitions
/// only for anchors that are both rendered and observed.
#[derive(Debug, Clone, Default)]
pub struct LayoutObserver {
    viewport_height: f64,
    /// Absolute `(top, height)` per rendered anchor id.
    anchors: HashMap<String, (f64, f64)>,
    watched: Vec<String>,
    intersecting: HashMap<String, bool>,
    options: ObserverOptions,
}

impl LayoutObserver {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            viewport_height,
            ..Self::default()
        }
    }

    pub fn with_anchor(mut self, slug: impl Into<String>, top: f64, height: f64) -> Self {
        self.anchors.insert(slug.into(), (top, height));
        self
    }

    pub fn watched(&self) -> &[String] {
        &self.watched
    }

    /// Scrolls the viewport to `scroll_y` and returns the resulting
    /// transitions, in document order.
    pub fn scroll_viewport(&mut self, scroll_y: f64) -> Vec<IntersectionEntry> {
        let mut ordered: Vec<(&String, f64, f64)> = self
            .watched
            .iter()
            .filter_map(|slug| {
                self.anchors
                    .get(slug)
                    .map(|(top, height)| (slug, *top, *height))
            })
            .collect();
        ordered.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut entries = Vec::new();
        for (slug, top, height) in ordered {
            let rel_top = top - scroll_y;
            let now =
                self.options
                    .is_intersecting(rel_top, rel_top + height, self.viewport_height);
            let before = self.intersecting.get(slug).copied().unwrap_or(false);
            if now != before {
                entries.push(IntersectionEntry {
                    slug: slug.clone(),
                    is_intersecting: now,
                });
            }
        }
        for entry in &entries {
            self.intersecting
                .insert(entry.slug.clone(), entry.is_intersecting);
        }
        entries
    }
}

impl ViewportObserver for LayoutObserver {
    fn observe(&mut self, slug: &str, options: &ObserverOptions) -> bool {
        if !self.anchors.contains_key(slug) {
            return false;
        }
        self.options = *options;
        if !self.watched.iter().any(|s| s == slug) {
            self.watched.push(slug.to_string());
        }
        true
    }

    fn unobserve(&mut self, slug: &str) {
        self.watched.retain(|s| s != slug);
        self.intersecting.remove(slug);
    }
}

impl ScrollSurface for LayoutObserver {
    fn anchor_top(&self, slug: &str) -> Option<f64> {
        self.anchors.get(slug).map(|(top, _)| *top)
    }

    fn scroll_to(&mut self, _top: f64, _behavior: ScrollBehavior) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingObserver {
        rendered: Vec<&'static str>,
        active: Vec<String>,
        observe_calls: usize,
        unobserve_calls: usize,
    }

    impl ViewportObserver for CountingObserver {
        fn observe(&mut self, slug: &str, _options: &ObserverOptions) -> bool {
            self.observe_calls += 1;
            if self.rendered.iter().any(|s| *s == slug) {
                self.active.push(slug.to_string());
                true
            } else {
                false
            }
        }

        fn unobserve(&mut self, slug: &str) {
            self.unobserve_calls += 1;
            self.active.retain(|s| s != slug);
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        tops: HashMap<String, f64>,
        scrolls: Vec<(f64, ScrollBehavior)>,
    }

    impl ScrollSurface for RecordingSurface {
        fn anchor_top(&self, slug: &str) -> Option<f64> {
            self.tops.get(slug).copied()
        }

        fn scroll_to(&mut self, top: f64, behavior: ScrollBehavior) {
            self.scrolls.push((top, behavior));
        }
    }

    fn headings() -> Vec<HeadingAnchor> {
        vec![
            HeadingAnchor::new("intro", "Intro", 2),
            HeadingAnchor::new("setup", "Setup", 3),
            HeadingAnchor::new("deploy", "Deploy", 2),
        ]
    }

    fn observer() -> CountingObserver {
        CountingObserver {
            rendered: vec!["intro", "setup", "deploy"],
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_headings_render_nothing() {
        let spy = Scrollspy::mount(Vec::new(), observer(), ObserverOptions::default());
        assert!(!spy.is_rendered());
        assert!(spy.entries().is_empty());
        assert_eq!(spy.observed_count(), 0);
        assert_eq!(spy.observer().observe_calls, 0);
        assert_eq!(spy.active_slug(), None);
    }

    #[test]
    fn test_mount_observes_every_heading() {
        let spy = Scrollspy::mount(headings(), observer(), ObserverOptions::default());
        assert_eq!(spy.observed_count(), 3);
        assert_eq!(spy.observer().active, vec!["intro", "setup", "deploy"]);
    }

    #[test]
    fn test_missing_anchor_is_skipped() {
        let obs = CountingObserver {
            rendered: vec!["intro", "deploy"],
            ..Default::default()
        };
        let mut spy = Scrollspy::mount(headings(), obs, ObserverOptions::default());
        assert_eq!(spy.observed_count(), 2);
        spy.on_intersections(&[IntersectionEntry::entering("deploy")]);
        assert_eq!(spy.active_slug(), Some("deploy"));
    }

    #[test]
    fn test_last_intersecting_entry_wins() {
        let mut spy = Scrollspy::mount(headings(), observer(), ObserverOptions::default());
        assert_eq!(spy.active_slug(), None);
        spy.on_intersections(&[
            IntersectionEntry::entering("intro"),
            IntersectionEntry::entering("setup"),
            IntersectionEntry::leaving("intro"),
        ]);
        assert_eq!(spy.active_slug(), Some("setup"));
    }

    #[test]
    fn test_active_slug_always_from_input() {
        let mut spy = Scrollspy::mount(headings(), observer(), ObserverOptions::default());
        spy.on_intersections(&[IntersectionEntry::entering("not-a-heading")]);
        assert_eq!(spy.active_slug(), None);

        spy.on_intersections(&[IntersectionEntry::entering("deploy")]);
        spy.set_headings(vec![HeadingAnchor::new("intro", "Intro", 2)]);
        assert_eq!(spy.active_slug(), None);
    }

    #[test]
    fn test_heading_change_releases_previous_observers() {
        let mut spy = Scrollspy::mount(headings(), observer(), ObserverOptions::default());
        spy.set_headings(vec![HeadingAnchor::new("intro", "Intro", 2)]);
        assert_eq!(spy.observer().unobserve_calls, 3);
        assert_eq!(spy.observer().active, vec!["intro"]);
        assert_eq!(spy.observed_count(), 1);
    }

    #[test]
    fn test_unmount_releases_everything() {
        let mut spy = Scrollspy::mount(headings(), observer(), ObserverOptions::default());
        spy.on_intersections(&[IntersectionEntry::entering("intro")]);
        spy.unmount();
        assert!(spy.observer().active.is_empty());
        assert_eq!(spy.observed_count(), 0);
        assert!(!spy.is_rendered());
        assert_eq!(spy.active_slug(), None);
    }

    #[test]
    fn test_entries_indent_relative_to_shallowest() {
        let mut spy = Scrollspy::mount(
            vec![
                HeadingAnchor::new("a", "A", 3),
                HeadingAnchor::new("b", "B", 4),
                HeadingAnchor::new("c", "C", 3),
            ],
            CountingObserver {
                rendered: vec!["a", "b", "c"],
                ..Default::default()
            },
            ObserverOptions::default(),
        );
        spy.on_intersections(&[IntersectionEntry::entering("b")]);
        let entries = spy.entries();
        let indents: Vec<u8> = entries.iter().map(|e| e.indent).collect();
        assert_eq!(indents, vec![0, 1, 0]);
        assert!(entries[1].active);
        assert!(!entries[0].active && !entries[2].active);
    }

    #[test]
    fn test_navigate_scrolls_smoothly_with_offset() {
        let mut spy = Scrollspy::mount(headings(), observer(), ObserverOptions::default());
        let mut surface = RecordingSurface::default();
        surface.tops.insert("deploy".to_string(), 1200.0);

        let outcome = spy.navigate("deploy", &mut surface, Presentation::Inline);
        assert!(outcome.prevent_default);
        assert_eq!(outcome.target_top, Some(1120.0));
        assert!(!outcome.panel_closed);
        assert_eq!(surface.scrolls, vec![(1120.0, ScrollBehavior::Smooth)]);
    }

    #[test]
    fn test_navigate_closes_panel_on_small_viewports() {
        let mut spy = Scrollspy::mount(headings(), observer(), ObserverOptions::default())
            .with_scroll_offset(50.0);
        let mut surface = RecordingSurface::default();
        surface.tops.insert("intro".to_string(), 20.0);
        spy.open_panel();

        let outcome = spy.navigate("intro", &mut surface, Presentation::Panel);
        assert!(outcome.panel_closed);
        assert!(!spy.is_panel_open());
        // Never scrolls above the document top.
        assert_eq!(outcome.target_top, Some(0.0));
    }

    #[test]
    fn test_navigate_to_missing_anchor_does_not_scroll() {
        let mut spy = Scrollspy::mount(headings(), observer(), ObserverOptions::default());
        let mut surface = RecordingSurface::default();
        let outcome = spy.navigate("setup", &mut surface, Presentation::Inline);
        assert!(outcome.prevent_default);
        assert_eq!(outcome.target_top, None);
        assert!(surface.scrolls.is_empty());
    }

    #[test]
    fn test_root_margin_string() {
        assert_eq!(ObserverOptions::default().root_margin(), "-100px 0px -33.33% 0px");
    }

    #[test]
    fn test_intersection_band() {
        let opts = ObserverOptions::default();
        // Viewport 900px tall: band is [100, 600].
        assert!(opts.is_intersecting(150.0, 190.0, 900.0));
        assert!(!opts.is_intersecting(80.0, 120.0, 900.0));
        assert!(!opts.is_intersecting(580.0, 620.0, 900.0));
        assert!(!opts.is_intersecting(700.0, 740.0, 900.0));
    }

    #[test]
    fn test_layout_observer_drives_scrollspy() {
        let layout = LayoutObserver::new(900.0)
            .with_anchor("intro", 0.0, 40.0)
            .with_anchor("setup", 800.0, 40.0)
            .with_anchor("deploy", 1600.0, 40.0);
        let mut spy = Scrollspy::mount(headings(), layout, ObserverOptions::default());

        let entries = spy.observer_mut().scroll_viewport(700.0);
        spy.on_intersections(&entries);
        assert_eq!(spy.active_slug(), Some("setup"));

        let entries = spy.observer_mut().scroll_viewport(1400.0);
        spy.on_intersections(&entries);
        assert_eq!(spy.active_slug(), Some("deploy"));

        // Scrolling to a gap between headings keeps the last active one.
        let entries = spy.observer_mut().scroll_viewport(2500.0);
        spy.on_intersections(&entries);
        assert_eq!(spy.active_slug(), Some("deploy"));
    }

    #[test]
    fn test_layout_observer_skips_unrendered() {
        let layout = LayoutObserver::new(900.0).with_anchor("intro", 0.0, 40.0);
        let spy = Scrollspy::mount(headings(), layout, ObserverOptions::default());
        assert_eq!(spy.observer().watched(), ["intro".to_string()]);
    }
}
