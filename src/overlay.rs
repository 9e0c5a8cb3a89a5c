//! Search overlay runtime.
//!
//! Drives the pure [`OverlayMachine`] on tokio: effects requested by the
//! machine are carried out against an [`OverlayHost`], and asynchronous
//! work (asset injection, index acquisition + binding creation, deferred
//! focus) runs on spawned tasks that report back over a channel.
//!
//! # Ordering
//!
//! ```text
//!  open ──▶ LoadAssets ──▶ AssetsLoaded ──▶ CreateBinding
//!                                              │ acquire_index()
//!                                              ▼
//!                       FocusQuery ◀── BindingCreated
//! ```
//!
//! Background tasks are never cancelled. Closing the overlay while they run
//! only changes what their completion does: the binding is created on the
//! next open instead.
//!
//! Completions are applied when the owner calls [`SearchOverlay::pump`]
//! (non-blocking) or [`SearchOverlay::settle`] (waits for all background
//! work). Every method that may spawn work must run inside a tokio runtime.

use anyhow::Result;
use content_discovery_core::overlay::{
    Effect, KeyPress, OverlayEvent, OverlayMachine, Phase, Shortcut, Transition,
};
use content_discovery_core::search::SearchHit;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::assets::{AssetRegistry, AssetSet};
use crate::binding::{BindingOptions, ResultBinding};
use crate::config::Config;
use crate::keyboard::{KeyOutcome, KeyboardHub, ListenerGuard};
use crate::loader::IndexLoader;

/// Page-level side effects of the overlay.
pub trait OverlayHost: Send + Sync {
    /// Disable (`true`) or restore (`false`) background scrolling.
    fn set_scroll_lock(&self, locked: bool);

    /// The binding has been attached to `container`.
    fn attach_binding(&self, container: &str);

    /// Move input focus to the query field.
    fn focus_query(&self);

    /// Replace the result area with `message`.
    fn render_degraded(&self, message: &str);
}

/// What a query against the overlay produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The overlay is closed.
    Closed,
    /// Open, but the binding is not ready yet.
    Pending,
    /// Live search is unavailable.
    Degraded(String),
    Results(Vec<SearchHit>),
}

enum Completion {
    Key(KeyPress),
    Assets(std::result::Result<(), String>),
    Binding(std::result::Result<Arc<ResultBinding>, String>),
    Focus,
}

/// Everything the overlay needs besides its host.
pub struct OverlaySettings {
    pub container: String,
    pub focus_delay: Duration,
    pub assets: AssetSet,
    pub options: BindingOptions,
    pub shortcut: Shortcut,
}

impl OverlaySettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            container: config.overlay.container.clone(),
            focus_delay: Duration::from_millis(config.overlay.focus_delay_ms),
            assets: AssetSet::from_config(&config.assets),
            options: BindingOptions::from_config(&config.overlay)?,
            shortcut: config.overlay.shortcut(),
        })
    }
}

/// The mounted search overlay of one page.
pub struct SearchOverlay {
    machine: OverlayMachine,
    settings: OverlaySettings,
    host: Arc<dyn OverlayHost>,
    assets: Arc<AssetRegistry>,
    loader: Arc<IndexLoader>,
    binding: Option<Arc<ResultBinding>>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
    keys: Option<ListenerGuard>,
}

impl SearchOverlay {
    pub fn new(
        settings: OverlaySettings,
        host: Arc<dyn OverlayHost>,
        assets: Arc<AssetRegistry>,
        loader: Arc<IndexLoader>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            machine: OverlayMachine::new(settings.shortcut),
            settings,
            host,
            assets,
            loader,
            binding: None,
            tx,
            rx,
            in_flight: 0,
            keys: None,
        }
    }

    /// Creates the overlay and registers its global key listener.
    pub fn mount(
        settings: OverlaySettings,
        host: Arc<dyn OverlayHost>,
        assets: Arc<AssetRegistry>,
        loader: Arc<IndexLoader>,
        keyboard: &KeyboardHub,
    ) -> Self {
        let mut overlay = Self::new(settings, host, assets, loader);
        overlay.attach_keyboard(keyboard);
        overlay
    }

    /// Registers the global key listener. A second call while attached is
    /// ignored.
    pub fn attach_keyboard(&mut self, keyboard: &KeyboardHub) {
        if self.keys.is_some() {
            return;
        }
        let tx = self.tx.clone();
        let shortcut = self.settings.shortcut;
        self.keys = Some(keyboard.register(Arc::new(move |press: &KeyPress| {
            let _ = tx.send(Completion::Key(press.clone()));
            KeyOutcome {
                prevent_default: shortcut.matches(press),
            }
        })));
    }

    /// Deregisters the global key listener.
    pub fn unmount(&mut self) {
        self.keys = None;
    }

    pub fn is_mounted(&self) -> bool {
        self.keys.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.machine.is_open()
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn machine(&self) -> &OverlayMachine {
        &self.machine
    }

    pub fn binding(&self) -> Option<Arc<ResultBinding>> {
        self.binding.clone()
    }

    pub fn open(&mut self) -> Transition {
        self.dispatch(OverlayEvent::Open)
    }

    pub fn close(&mut self) -> Transition {
        self.dispatch(OverlayEvent::Close)
    }

    pub fn backdrop_click(&mut self) -> Transition {
        self.dispatch(OverlayEvent::BackdropClick)
    }

    pub fn panel_click(&mut self) -> Transition {
        self.dispatch(OverlayEvent::PanelClick)
    }

    /// Handles a key press delivered directly rather than through the hub.
    pub fn key(&mut self, press: KeyPress) -> KeyOutcome {
        let t = self.dispatch(OverlayEvent::Key(press));
        KeyOutcome {
            prevent_default: t.prevent_default,
        }
    }

    /// Feeds `event` to the state machine and performs the resulting effects.
    pub fn dispatch(&mut self, event: OverlayEvent) -> Transition {
        debug!(?event, phase = ?self.machine.phase(), "overlay event");
        let transition = self.machine.handle(event);
        for effect in &transition.effects {
            self.perform(effect);
        }
        transition
    }

    fn perform(&mut self, effect: &Effect) {
        match effect {
            Effect::LockScroll => self.host.set_scroll_lock(true),
            Effect::UnlockScroll => self.host.set_scroll_lock(false),
            Effect::LoadAssets => {
                let assets = Arc::clone(&self.assets);
                let set = self.settings.assets.clone();
                self.spawn(
                    async move {
                        Completion::Assets(assets.load(&set).await.map_err(|e| format!("{:#}", e)))
                    },
                    Completion::Assets(Err("asset loading task panicked".to_string())),
                );
            }
            Effect::CreateBinding => {
                if let Some(existing) = self.binding.clone() {
                    // Reuse; never build a second binding.
                    self.in_flight += 1;
                    let _ = self.tx.send(Completion::Binding(Ok(existing)));
                    return;
                }
                let loader = Arc::clone(&self.loader);
                let container = self.settings.container.clone();
                let options = self.settings.options.clone();
                self.spawn(
                    async move {
                        let result = loader
                            .acquire_index()
                            .await
                            .map(|handle| Arc::new(ResultBinding::new(container, options, handle)))
                            .map_err(|e| e.to_string());
                        Completion::Binding(result)
                    },
                    Completion::Binding(Err("binding task panicked".to_string())),
                );
            }
            Effect::FocusQuery => {
                let delay = self.settings.focus_delay;
                self.spawn(
                    async move {
                        tokio::time::sleep(delay).await;
                        Completion::Focus
                    },
                    Completion::Focus,
                );
            }
            Effect::ShowDegraded(message) => {
                warn!(notice = %message, "search overlay degraded");
                self.host.render_degraded(message);
            }
        }
    }

    /// Runs `work` in the background. If it panics, `fallback` is
    /// delivered in its place so every spawned task reports exactly once.
    fn spawn<F>(&mut self, work: F, fallback: Completion)
    where
        F: std::future::Future<Output = Completion> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        let task = tokio::spawn(work);
        tokio::spawn(async move {
            let completion = match task.await {
                Ok(completion) => completion,
                Err(e) => {
                    warn!(error = %e, "overlay background task failed");
                    fallback
                }
            };
            let _ = tx.send(completion);
        });
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Key(press) => {
                self.dispatch(OverlayEvent::Key(press));
            }
            Completion::Assets(result) => {
                self.in_flight -= 1;
                match result {
                    Ok(()) => self.dispatch(OverlayEvent::AssetsLoaded),
                    Err(reason) => self.dispatch(OverlayEvent::AssetsFailed(reason)),
                };
            }
            Completion::Binding(result) => {
                self.in_flight -= 1;
                match result {
                    Ok(binding) => {
                        if self.binding.is_none() {
                            self.host.attach_binding(binding.container());
                            self.binding = Some(binding);
                        }
                        self.dispatch(OverlayEvent::BindingCreated);
                    }
                    Err(reason) => {
                        self.dispatch(OverlayEvent::BindingFailed(reason));
                    }
                }
            }
            Completion::Focus => {
                self.in_flight -= 1;
                if self.machine.is_open() && self.binding.is_some() {
                    self.host.focus_query();
                }
            }
        }
    }

    /// Applies every completion that has already arrived.
    pub fn pump(&mut self) {
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
        }
    }

    /// Waits until all background work has finished and been applied.
    pub async fn settle(&mut self) {
        loop {
            self.pump();
            if self.in_flight == 0 {
                break;
            }
            match self.rx.recv().await {
                Some(completion) => self.apply(completion),
                None => break,
            }
        }
    }

    /// Runs `query` through the binding.
    pub async fn query(&self, query: &str) -> QueryOutcome {
        if !self.machine.is_open() {
            return QueryOutcome::Closed;
        }
        match (&self.binding, self.machine.degraded()) {
            (Some(binding), _) => match binding.search(query).await {
                Ok(hits) => QueryOutcome::Results(hits),
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "search query failed");
                    QueryOutcome::Degraded(e.to_string())
                }
            },
            (None, Some(message)) => QueryOutcome::Degraded(message.to_string()),
            (None, None) => QueryOutcome::Pending,
        }
    }
}
