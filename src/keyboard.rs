//! Page-wide keyboard listener registry.
//!
//! Components register a listener for the lifetime of their mount. The
//! returned [`ListenerGuard`] deregisters on drop, so registration and
//! deregistration are always paired.

use content_discovery_core::overlay::KeyPress;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// What the page should do with a key press after dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyOutcome {
    pub prevent_default: bool,
}

pub type KeyListener = Arc<dyn Fn(&KeyPress) -> KeyOutcome + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, KeyListener)>,
}

/// Global key event source of a page.
#[derive(Clone, Default)]
pub struct KeyboardHub {
    inner: Arc<Mutex<Listeners>>,
}

impl KeyboardHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: KeyListener) -> ListenerGuard {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.push((id, listener));
        ListenerGuard {
            hub: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Delivers `press` to every listener. Default handling is prevented
    /// if any listener asks for it.
    pub fn dispatch(&self, press: &KeyPress) -> KeyOutcome {
        let listeners: Vec<KeyListener> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        let mut outcome = KeyOutcome::default();
        for listener in listeners {
            outcome.prevent_default |= listener(press).prevent_default;
        }
        outcome
    }
}

/// Keeps a listener registered until dropped.
#[must_use = "dropping the guard deregisters the listener"]
pub struct ListenerGuard {
    hub: Weak<Mutex<Listeners>>,
    id: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}
