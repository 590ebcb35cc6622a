use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle, time::sleep};

pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(300);

/// Propagates a value only after no newer value arrived for `window`.
///
/// Exported for clients that drive the task and user search routes from live
/// input: push each keystroke's term and query on the settled value. The
/// HTTP handlers answer immediately and never debounce.
pub struct Debouncer<T> {
    window: Duration,
    tx: watch::Sender<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + Sync + 'static> Debouncer<T> {
    pub fn new(initial: T, window: Duration) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            window,
            tx,
            pending: None,
        }
    }

    pub fn with_default_window(initial: T) -> Self {
        Self::new(initial, DEFAULT_QUIET_WINDOW)
    }

    /// Receiver that observes settled values.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Latest settled value.
    pub fn current(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Restarts the quiet window with `value` as the candidate.
    pub fn push(&mut self, value: T) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        let tx = self.tx.clone();
        let window = self.window;
        self.pending = Some(tokio::spawn(async move {
            sleep(window).await;
            tx.send_replace(value);
        }));
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
