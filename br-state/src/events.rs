//! One-shot side-effect commands (navigation, toasts).
//!
//! Delivery is at most once and single-consumer. An event emitted while no
//! listener is attached is dropped and logged; callers that cannot afford to
//! lose an event must also reflect it in their state snapshot.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct EventChannel<E> {
    name: &'static str,
    listener: Arc<Mutex<Option<mpsc::UnboundedSender<E>>>>,
}

impl<E> Clone for EventChannel<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            listener: self.listener.clone(),
        }
    }
}

impl<E: Debug + Send + 'static> EventChannel<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Attach a listener, detaching the previous one. Events not yet read by
    /// the previous listener stay with it.
    pub fn listen(&self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut listener) = self.listener.lock() {
            if listener.replace(tx).is_some() {
                debug!("{} events: previous listener replaced", self.name);
            }
        }
        rx
    }

    /// Whether a live listener is attached.
    pub fn has_listener(&self) -> bool {
        self.listener
            .lock()
            .map(|l| l.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    /// Deliver an event to the current listener. Returns false when it was dropped.
    pub fn emit(&self, event: E) -> bool {
        let Ok(mut listener) = self.listener.lock() else {
            warn!("{} events: listener lock poisoned, dropped {event:?}", self.name);
            return false;
        };
        let Some(tx) = listener.as_ref() else {
            warn!("{} events: no listener, dropped {event:?}", self.name);
            return false;
        };
        match tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                *listener = None;
                warn!("{} events: listener gone, dropped {event:?}", self.name);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_listener_drops() {
        let channel = EventChannel::new("test");
        assert!(!channel.emit(1));
        assert!(!channel.has_listener());
    }

    #[test]
    fn test_listener_receives_once() {
        let channel = EventChannel::new("test");
        let mut rx = channel.listen();

        assert!(channel.emit(5));
        assert_eq!(rx.try_recv().unwrap(), 5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_new_listener_replaces_old() {
        let channel = EventChannel::new("test");
        let mut first = channel.listen();
        let mut second = channel.listen();

        assert!(channel.emit("go"));
        assert!(first.try_recv().is_err());
        assert_eq!(second.try_recv().unwrap(), "go");
    }

    #[test]
    fn test_dropped_listener_detaches() {
        let channel = EventChannel::new("test");
        drop(channel.listen());

        assert!(!channel.has_listener());
        assert!(!channel.emit(1));
    }
}
