//! Resettable one-shot timer.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Fires a callback once `delay` has passed without another reset.
///
/// Each [`reset`](Self::reset) aborts the pending wait and starts a new one.
/// The callback itself runs on its own task, so a reset or cancel that lands
/// while the callback is running never interrupts it.
///
/// Tasks are spawned on the runtime the timer was created in, so `reset` may
/// be called from any thread.
#[derive(Debug)]
pub struct DebounceTimer {
    delay: Duration,
    runtime: Handle,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceTimer {
    /// Binds the timer to the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(delay: Duration) -> Self {
        Self::with_runtime(delay, Handle::current())
    }

    pub fn with_runtime(delay: Duration, runtime: Handle) -> Self {
        Self {
            delay,
            runtime,
            handle: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restarts the wait; `on_fire` runs when it elapses.
    pub fn reset<F, Fut>(&self, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let runtime = self.runtime.clone();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            runtime.spawn(on_fire());
        });

        let previous = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stops the pending wait, if any. A callback already running is unaffected.
    pub fn cancel(&self) {
        let previous = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// True while a wait is pending.
    pub fn is_armed(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_callback(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> std::future::Ready<()> + Send + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_postpones_firing() {
        let timer = DebounceTimer::new(Duration::from_millis(800));
        let fired = Arc::new(AtomicUsize::new(0));

        timer.reset(counter_callback(&fired));
        tokio::time::sleep(Duration::from_millis(500)).await;
        timer.reset(counter_callback(&fired));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_from_a_plain_thread() {
        let timer = Arc::new(DebounceTimer::new(Duration::from_millis(100)));
        let fired = Arc::new(AtomicUsize::new(0));

        let callback = counter_callback(&fired);
        let remote = timer.clone();
        std::thread::spawn(move || remote.reset(callback))
            .join()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let timer = DebounceTimer::new(Duration::from_millis(100));
        let fired = Arc::new(AtomicUsize::new(0));

        timer.reset(counter_callback(&fired));
        timer.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
