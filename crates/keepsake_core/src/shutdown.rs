//! Shutdown veto for writes in progress.
//!
//! The embedding application asks [`ShutdownVeto::request_quit`] before it
//! exits. While any [`VetoGuard`] is alive the answer is no, so a physical
//! write is never cut off half way.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

type BlockedCallback = Box<dyn Fn() + Send + Sync>;

struct VetoInner {
    active: AtomicUsize,
    idle: Notify,
    on_blocked: Mutex<Option<BlockedCallback>>,
}

/// Shared registry of in-progress writes.
///
/// Clones share the same registry.
#[derive(Clone)]
pub struct ShutdownVeto {
    inner: Arc<VetoInner>,
}

impl Default for ShutdownVeto {
    fn default() -> Self {
        Self {
            inner: Arc::new(VetoInner {
                active: AtomicUsize::new(0),
                idle: Notify::new(),
                on_blocked: Mutex::new(None),
            }),
        }
    }
}

impl fmt::Debug for ShutdownVeto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownVeto")
            .field("active", &self.active_count())
            .finish()
    }
}

impl ShutdownVeto {
    /// Creates an idle veto registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the callback run when a quit request is refused.
    pub fn on_blocked(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.inner.on_blocked.lock() = Some(Box::new(callback));
    }

    /// Blocks shutdown until the returned guard is dropped.
    #[must_use = "shutdown is only blocked while the guard is alive"]
    pub fn prevent(&self) -> VetoGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        VetoGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns true while any guard is alive.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.active_count() > 0
    }

    /// Number of live guards.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Asks whether the process may exit now.
    ///
    /// Returns false and runs the `on_blocked` callback while a write is in
    /// progress.
    pub fn request_quit(&self) -> bool {
        if !self.is_blocked() {
            return true;
        }
        debug!(active = self.active_count(), "quit refused, write in progress");
        if let Some(callback) = self.inner.on_blocked.lock().as_ref() {
            callback();
        }
        false
    }

    /// Waits until no guard is alive.
    pub async fn wait_idle(&self) {
        loop {
            // Register before checking so a release in between is not missed.
            let released = self.inner.idle.notified();
            if !self.is_blocked() {
                return;
            }
            released.await;
        }
    }
}

/// Keeps shutdown blocked while alive. Releases exactly once, on drop.
pub struct VetoGuard {
    inner: Arc<VetoInner>,
}

impl fmt::Debug for VetoGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VetoGuard").finish_non_exhaustive()
    }
}

impl Drop for VetoGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
