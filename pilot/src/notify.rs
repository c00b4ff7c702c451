//! Fire-and-forget re-render propagation.
//!
//! The coordinator fires a "state changed" signal after every transition;
//! views subscribe at startup and re-query published state when woken. The
//! coordinator never holds references to the views themselves.

use tokio::sync::watch;

pub struct RenderNotifier {
    tx: watch::Sender<u64>,
}

impl RenderNotifier {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    /// Wake every subscriber. Cheap when nobody is listening.
    pub fn fire(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }

    pub fn subscribe(&self) -> RenderSignal {
        RenderSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }
}

impl Default for RenderNotifier {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RenderSignal {
    rx: watch::Receiver<u64>,
}

impl RenderSignal {
    /// Completes the next time the notifier fires after the last observed
    /// generation. Returns the new generation.
    pub async fn changed(&mut self) -> u64 {
        // The notifier outliving every view is the normal shutdown order;
        // a closed channel just reports the final generation.
        let _ = self.rx.changed().await;
        *self.rx.borrow_and_update()
    }

    pub fn generation(&self) -> u64 {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fire_wakes_subscriber() {
        let notifier = RenderNotifier::new();
        let mut signal = notifier.subscribe();
        assert_eq!(signal.generation(), 0);

        notifier.fire();
        assert_eq!(signal.changed().await, 1);

        notifier.fire();
        notifier.fire();
        assert_eq!(signal.changed().await, 3);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_current_generation() {
        let notifier = RenderNotifier::new();
        notifier.fire();
        notifier.fire();

        let signal = notifier.subscribe();
        assert_eq!(signal.generation(), 2);
        assert_eq!(notifier.generation(), 2);
    }
}
