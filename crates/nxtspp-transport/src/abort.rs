use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

type AbortHook = Box<dyn FnOnce() + Send>;

/// Cancellation signal for a blocking [`Connector::open`](crate::Connector::open).
///
/// Connectors register hooks that interrupt their blocking call (typically by
/// shutting down the half-opened socket). Firing the signal runs every hook
/// exactly once; hooks registered after the signal fired run immediately.
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

#[derive(Default)]
struct AbortInner {
    aborted: AtomicBool,
    hooks: Mutex<Vec<AbortHook>>,
}

impl AbortSignal {
    /// Create a signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent.
    pub fn abort(&self) {
        let hooks = {
            let mut hooks = self.inner.hooks.lock();
            if self.inner.aborted.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *hooks)
        };
        for hook in hooks {
            hook();
        }
    }

    /// Whether the signal has fired.
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Register a hook to run when the signal fires.
    pub fn on_abort(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let mut hooks = self.inner.hooks.lock();
            if !self.inner.aborted.load(Ordering::SeqCst) {
                hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }

    /// Drop registered hooks without running them.
    ///
    /// Connectors call this once the open completed so the hooks no longer
    /// hold on to the connection.
    pub fn clear_hooks(&self) {
        self.inner.hooks.lock().clear();
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .field("hooks", &self.inner.hooks.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn abort_runs_hooks_once() {
        let signal = AbortSignal::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        signal.on_abort(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!signal.is_aborted());
        signal.abort();
        signal.abort();

        assert!(signal.is_aborted());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hook_registered_after_abort_runs_immediately() {
        let signal = AbortSignal::new();
        signal.abort();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        signal.on_abort(move || flag.store(true, Ordering::SeqCst));

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn cleared_hooks_do_not_run() {
        let signal = AbortSignal::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        signal.on_abort(move || flag.store(true, Ordering::SeqCst));

        signal.clear_hooks();
        signal.abort();

        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn clones_share_state() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        clone.abort();
        assert!(signal.is_aborted());
    }
}
