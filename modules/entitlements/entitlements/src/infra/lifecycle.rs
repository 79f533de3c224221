//! Broadcast-backed application lifecycle signal.

use tokio::sync::broadcast;

use crate::domain::ports::{AppTransition, LifecycleSignal};

const TRANSITION_CAPACITY: usize = 16;

/// Process-local lifecycle emitter.
///
/// Platform integrations call the notify methods; consumers subscribe.
pub struct AppLifecycle {
    tx: broadcast::Sender<AppTransition>,
}

impl AppLifecycle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self { tx }
    }

    pub fn notify_foreground(&self) {
        let _ = self.tx.send(AppTransition::Foreground);
    }

    pub fn notify_background(&self) {
        let _ = self.tx.send(AppTransition::Background);
    }
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleSignal for AppLifecycle {
    fn subscribe(&self) -> broadcast::Receiver<AppTransition> {
        self.tx.subscribe()
    }
}
