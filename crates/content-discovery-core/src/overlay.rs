//! Search overlay state machine.
//!
//! Pure transition logic for the search modal. The machine never performs
//! I/O: each [`OverlayMachine::handle`] call returns the [`Effect`]s the
//! host must carry out, and the host reports asynchronous completions back
//! as further events.
//!
//! ```text
//!            Open                AssetsLoaded + BindingCreated
//!  Closed ─────────▶ Opening ─────────────────────────────────▶ Open
//!    ▲                  │ AssetsFailed / BindingFailed            │
//!    │                  └──────────▶ Open (degraded) ◀────────────┤
//!    └──────────── Close / Escape / BackdropClick ◀───────────────┘
//! ```
//!
//! Two facts outlive open/close cycles for the whole page session: whether
//! the supporting assets were ever requested, and whether the result
//! binding exists. Closing never resets either.

/// Message shown in place of results when search cannot be started.
pub const DEGRADED_NOTICE: &str =
    "Search is only available in production builds. Build the site to generate the search index, then reload.";

/// Visibility phase of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    /// Visible, waiting for assets or the binding.
    Opening,
    Open,
}

/// Page-wide status of the supporting stylesheet and script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetStatus {
    NotRequested,
    Loading,
    Ready,
    Failed(String),
}

/// A key press as delivered by the global keyboard listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    /// Key value (`"k"`, `"Escape"`, ...).
    pub key: String,
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyPress {
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            meta: false,
            ctrl: false,
            shift: false,
            alt: false,
        }
    }

    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(key)
        }
    }

    pub fn meta(key: impl Into<String>) -> Self {
        Self {
            meta: true,
            ..Self::plain(key)
        }
    }

    pub fn escape() -> Self {
        Self::plain("Escape")
    }

    pub fn is_escape(&self) -> bool {
        self.key == "Escape" || self.key == "Esc"
    }
}

/// The open chord: meta or ctrl plus a letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub letter: char,
}

impl Default for Shortcut {
    fn default() -> Self {
        Self { letter: 'k' }
    }
}

impl Shortcut {
    pub fn new(letter: char) -> Self {
        Self {
            letter: letter.to_ascii_lowercase(),
        }
    }

    pub fn matches(&self, press: &KeyPress) -> bool {
        if !(press.meta || press.ctrl) {
            return false;
        }
        let mut chars = press.key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_ascii_lowercase() == self.letter,
            _ => false,
        }
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    Open,
    Close,
    Key(KeyPress),
    BackdropClick,
    /// Click inside the panel; contained, never closes.
    PanelClick,
    AssetsLoaded,
    AssetsFailed(String),
    BindingCreated,
    BindingFailed(String),
}

/// Side effects requested from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LockScroll,
    UnlockScroll,
    /// Inject the stylesheet and script bundle. Emitted once per session.
    LoadAssets,
    /// Acquire the index and create the result binding. Emitted once per
    /// session unless a previous attempt failed.
    CreateBinding,
    FocusQuery,
    ShowDegraded(String),
}

/// Result of handling one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub effects: Vec<Effect>,
    /// The browser's default handling of the triggering key must be
    /// suppressed.
    pub prevent_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingStatus {
    Absent,
    Creating,
    Ready,
}

/// Search overlay state.
#[derive(Debug, Clone)]
pub struct OverlayMachine {
    shortcut: Shortcut,
    phase: Phase,
    assets: AssetStatus,
    binding: BindingStatus,
    index_ready: bool,
    degraded: Option<String>,
}

impl Default for OverlayMachine {
    fn default() -> Self {
        Self::new(Shortcut::default())
    }
}

impl OverlayMachine {
    pub fn new(shortcut: Shortcut) -> Self {
        Self {
            shortcut,
            phase: Phase::Closed,
            assets: AssetStatus::NotRequested,
            binding: BindingStatus::Absent,
            index_ready: false,
            degraded: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase != Phase::Closed
    }

    pub fn assets(&self) -> &AssetStatus {
        &self.assets
    }

    pub fn binding_ready(&self) -> bool {
        self.binding == BindingStatus::Ready
    }

    pub fn index_ready(&self) -> bool {
        self.index_ready
    }

    /// Reason live search is unavailable, if it is.
    pub fn degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    pub fn shortcut(&self) -> Shortcut {
        self.shortcut
    }

    pub fn handle(&mut self, event: OverlayEvent) -> Transition {
        let mut t = Transition::default();
        match event {
            OverlayEvent::Open => self.open(&mut t),
            OverlayEvent::Close | OverlayEvent::BackdropClick => self.close(&mut t),
            OverlayEvent::PanelClick => {}
            OverlayEvent::Key(press) => {
                if self.shortcut.matches(&press) {
                    t.prevent_default = true;
                    self.open(&mut t);
                } else if press.is_escape() && self.is_open() {
                    self.close(&mut t);
                }
            }
            OverlayEvent::AssetsLoaded => {
                self.assets = AssetStatus::Ready;
                self.maybe_bind(&mut t);
            }
            OverlayEvent::AssetsFailed(reason) => {
                self.assets = AssetStatus::Failed(reason);
                self.degrade(&mut t);
            }
            OverlayEvent::BindingCreated => {
                self.binding = BindingStatus::Ready;
                self.index_ready = true;
                self.degraded = None;
                if self.is_open() {
                    self.phase = Phase::Open;
                    t.effects.push(Effect::FocusQuery);
                }
            }
            OverlayEvent::BindingFailed(_) => {
                // A failed binding may be retried on the next open.
                self.binding = BindingStatus::Absent;
                self.degrade(&mut t);
            }
        }
        t
    }

    fn open(&mut self, t: &mut Transition) {
        if self.is_open() {
            return;
        }
        t.effects.push(Effect::LockScroll);

        if self.binding == BindingStatus::Ready {
            self.phase = Phase::Open;
            t.effects.push(Effect::FocusQuery);
            return;
        }
        self.phase = Phase::Opening;

        match self.assets {
            AssetStatus::NotRequested => {
                self.assets = AssetStatus::Loading;
                t.effects.push(Effect::LoadAssets);
            }
            AssetStatus::Loading => {}
            AssetStatus::Ready => self.maybe_bind(t),
            AssetStatus::Failed(_) => self.degrade(t),
        }
    }

    fn close(&mut self, t: &mut Transition) {
        if !self.is_open() {
            return;
        }
        self.phase = Phase::Closed;
        t.effects.push(Effect::UnlockScroll);
    }

    fn maybe_bind(&mut self, t: &mut Transition) {
        if self.is_open() && self.assets == AssetStatus::Ready && self.binding == BindingStatus::Absent
        {
            self.binding = BindingStatus::Creating;
            t.effects.push(Effect::CreateBinding);
        }
    }

    fn degrade(&mut self, t: &mut Transition) {
        self.degraded = Some(DEGRADED_NOTICE.to_string());
        if self.is_open() {
            self.phase = Phase::Open;
            t.effects.push(Effect::ShowDegraded(DEGRADED_NOTICE.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(effects: &[Effect], wanted: &Effect) -> usize {
        effects.iter().filter(|e| *e == wanted).count()
    }

    fn run(machine: &mut OverlayMachine, events: Vec<OverlayEvent>) -> Vec<Effect> {
        events
            .into_iter()
            .flat_map(|e| machine.handle(e).effects)
            .collect()
    }

    #[test]
    fn test_first_open_requests_assets() {
        let mut m = OverlayMachine::default();
        let t = m.handle(OverlayEvent::Open);
        assert_eq!(t.effects, vec![Effect::LockScroll, Effect::LoadAssets]);
        assert_eq!(m.phase(), Phase::Opening);
        assert_eq!(m.assets(), &AssetStatus::Loading);
    }

    #[test]
    fn test_assets_requested_once_across_reopens() {
        let mut m = OverlayMachine::default();
        let effects = run(
            &mut m,
            vec![
                OverlayEvent::Open,
                OverlayEvent::Close,
                OverlayEvent::Open,
                OverlayEvent::Close,
                OverlayEvent::AssetsLoaded,
                OverlayEvent::Open,
                OverlayEvent::BindingCreated,
                OverlayEvent::Close,
                OverlayEvent::Open,
            ],
        );
        assert_eq!(count(&effects, &Effect::LoadAssets), 1);
        assert_eq!(count(&effects, &Effect::CreateBinding), 1);
    }

    #[test]
    fn test_bind_then_focus_ordering() {
        let mut m = OverlayMachine::default();
        m.handle(OverlayEvent::Open);
        let t = m.handle(OverlayEvent::AssetsLoaded);
        assert_eq!(t.effects, vec![Effect::CreateBinding]);
        assert_eq!(m.phase(), Phase::Opening);

        let t = m.handle(OverlayEvent::BindingCreated);
        assert_eq!(t.effects, vec![Effect::FocusQuery]);
        assert_eq!(m.phase(), Phase::Open);
        assert!(m.index_ready());
        assert!(m.binding_ready());
    }

    #[test]
    fn test_assets_loaded_while_closed_binds_on_next_open() {
        let mut m = OverlayMachine::default();
        m.handle(OverlayEvent::Open);
        m.handle(OverlayEvent::Close);
        let t = m.handle(OverlayEvent::AssetsLoaded);
        assert!(t.effects.is_empty());
        assert!(!m.binding_ready());

        let t = m.handle(OverlayEvent::Open);
        assert_eq!(t.effects, vec![Effect::LockScroll, Effect::CreateBinding]);
    }

    #[test]
    fn test_close_keeps_binding() {
        let mut m = OverlayMachine::default();
        run(
            &mut m,
            vec![
                OverlayEvent::Open,
                OverlayEvent::AssetsLoaded,
                OverlayEvent::BindingCreated,
            ],
        );
        let t = m.handle(OverlayEvent::Close);
        assert_eq!(t.effects, vec![Effect::UnlockScroll]);
        assert!(m.binding_ready());
        assert!(m.index_ready());

        let t = m.handle(OverlayEvent::Open);
        assert_eq!(t.effects, vec![Effect::LockScroll, Effect::FocusQuery]);
        assert_eq!(m.phase(), Phase::Open);
    }

    #[test]
    fn test_shortcut_opens_and_prevents_default() {
        let mut m = OverlayMachine::default();
        let t = m.handle(OverlayEvent::Key(KeyPress::meta("k")));
        assert!(t.prevent_default);
        assert!(m.is_open());

        // Already open: still claims the chord, no duplicate effects.
        let t = m.handle(OverlayEvent::Key(KeyPress::ctrl("K")));
        assert!(t.prevent_default);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_plain_letter_is_ignored() {
        let mut m = OverlayMachine::default();
        let t = m.handle(OverlayEvent::Key(KeyPress::plain("k")));
        assert!(!t.prevent_default);
        assert!(!m.is_open());
    }

    #[test]
    fn test_escape_is_contextual() {
        let mut m = OverlayMachine::default();
        let t = m.handle(OverlayEvent::Key(KeyPress::escape()));
        assert_eq!(t, Transition::default());
        assert_eq!(m.phase(), Phase::Closed);

        m.handle(OverlayEvent::Open);
        let t = m.handle(OverlayEvent::Key(KeyPress::escape()));
        assert!(!t.prevent_default);
        assert_eq!(t.effects, vec![Effect::UnlockScroll]);
        assert_eq!(m.phase(), Phase::Closed);
    }

    #[test]
    fn test_backdrop_closes_panel_click_contained() {
        let mut m = OverlayMachine::default();
        m.handle(OverlayEvent::Open);
        let t = m.handle(OverlayEvent::PanelClick);
        assert!(t.effects.is_empty());
        assert!(m.is_open());

        let t = m.handle(OverlayEvent::BackdropClick);
        assert_eq!(t.effects, vec![Effect::UnlockScroll]);
        assert!(!m.is_open());
    }

    #[test]
    fn test_asset_failure_degrades() {
        let mut m = OverlayMachine::default();
        m.handle(OverlayEvent::Open);
        let t = m.handle(OverlayEvent::AssetsFailed("404".to_string()));
        assert_eq!(
            t.effects,
            vec![Effect::ShowDegraded(DEGRADED_NOTICE.to_string())]
        );
        assert_eq!(m.phase(), Phase::Open);
        assert_eq!(m.degraded(), Some(DEGRADED_NOTICE));

        // Reopening shows the notice again without re-requesting assets.
        m.handle(OverlayEvent::Close);
        let t = m.handle(OverlayEvent::Open);
        assert_eq!(
            t.effects,
            vec![
                Effect::LockScroll,
                Effect::ShowDegraded(DEGRADED_NOTICE.to_string())
            ]
        );
    }

    #[test]
    fn test_binding_failure_allows_retry() {
        let mut m = OverlayMachine::default();
        run(&mut m, vec![OverlayEvent::Open, OverlayEvent::AssetsLoaded]);
        let t = m.handle(OverlayEvent::BindingFailed("index missing".to_string()));
        assert!(matches!(t.effects.as_slice(), [Effect::ShowDegraded(_)]));
        assert!(!m.index_ready());

        m.handle(OverlayEvent::Close);
        let t = m.handle(OverlayEvent::Open);
        assert_eq!(t.effects, vec![Effect::LockScroll, Effect::CreateBinding]);
    }

    #[test]
    fn test_shortcut_letter_is_case_insensitive() {
        let s = Shortcut::new('K');
        assert!(s.matches(&KeyPress::meta("k")));
        assert!(s.matches(&KeyPress::ctrl("K")));
        assert!(!s.matches(&KeyPress::ctrl("kk")));
        assert!(!s.matches(&KeyPress::ctrl("j")));
    }
}
