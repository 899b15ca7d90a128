//! Coordinates graceful shutdown (§5, §7's Fatal kind) across two trigger
//! sources that otherwise know nothing about each other: the process signal
//! handler and a bus transport giving up on reconnecting.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Fires once. Whichever source calls `trigger()` first wins; a `fatal`
/// trigger means the process should exit non-zero once draining finishes.
#[derive(Default)]
pub struct Shutdown {
    notify: Notify,
    triggered: AtomicBool,
    fatal: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, fatal: bool) {
        if fatal {
            self.fatal.store(true, Ordering::SeqCst);
        }
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolves once `trigger()` has been called, even if that happened
    /// before this call started waiting.
    pub async fn recv(&self) {
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }
        self.notify.notified().await;
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }
}
