//! Observable UI-state snapshots.

use std::sync::Arc;

use tokio::sync::watch;

/// Current-value holder for one controller's state.
///
/// Readers always see the latest snapshot; intermediate values may be
/// skipped. Clones share the same slot.
pub struct StateHolder<S> {
    sender: Arc<watch::Sender<S>>,
}

impl<S> Clone for StateHolder<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S> StateHolder<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: S) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> S {
        self.sender.borrow().clone()
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.sender.subscribe()
    }

    /// Mutate the state in place. Subscribers are only woken when the
    /// value actually changed.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut S),
    {
        self.sender.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
    }

    /// Wait until the state satisfies `pred`, checking the current value first.
    pub async fn wait_for<P>(&self, pred: P) -> S
    where
        P: FnMut(&S) -> bool,
    {
        let mut rx = self.sender.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let state = match rx.wait_for(pred).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        };
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Counter {
        value: u32,
    }

    #[test]
    fn test_update_changes_snapshot() {
        let holder = StateHolder::new(Counter::default());
        holder.update(|s| s.value = 3);
        assert_eq!(holder.snapshot().value, 3);
    }

    #[tokio::test]
    async fn test_unchanged_update_does_not_notify() {
        let holder = StateHolder::new(Counter::default());
        let mut rx = holder.subscribe();

        holder.update(|s| s.value = 0);
        assert!(!rx.has_changed().unwrap());

        holder.update(|s| s.value = 1);
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().value, 1);
    }

    #[tokio::test]
    async fn test_wait_for_sees_later_update() {
        let holder = StateHolder::new(Counter::default());
        let writer = holder.clone();
        tokio::spawn(async move {
            writer.update(|s| s.value = 7);
        });
        let state = holder.wait_for(|s| s.value == 7).await;
        assert_eq!(state.value, 7);
    }
}
