//! Trailing-edge event coalescing.
//!
//! A single save produces several raw file-system events; the debouncer
//! collapses a burst within one window into exactly one invocation of the
//! wrapped action, firing after the burst goes quiet.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
}

impl Debouncer {
    pub fn new<F, Fut>(window: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Extend the window while the burst continues.
                loop {
                    match tokio::time::timeout(window, rx.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }
                action().await;
            }
        });

        Self { tx }
    }

    /// Record one raw event. Never blocks; dropped silently after the
    /// debouncer itself is shut down.
    pub fn call(&self) {
        let _ = self.tx.send(());
    }
}
