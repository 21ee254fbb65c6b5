//! Distributor event stream.
//!
//! The dispatch core reports everything observable — pool idle, recovered
//! failures — through a broadcast of [`DistributorEvent`]s. Listeners
//! register via [`Distributor::subscribe`](crate::Distributor::subscribe)
//! and read from an unbounded channel; events are sent synchronously from
//! whichever task detected the condition. A listener that drops its
//! receiver is pruned on the next emit, and events with no listeners are
//! silently dropped.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::DistributorError;

/// Which component a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// The dispatch cycle itself (including work-source polling).
    Distributor,
    /// The worker slot at this pool index.
    Slot(usize),
}

/// Notifications emitted by the dispatch core.
#[derive(Debug, Clone)]
pub enum DistributorEvent {
    /// The work source returned zero items while at least one slot was
    /// free — the pool is idle and no work is available.
    WorkItemsCleared,
    /// A failure was recovered somewhere in the core. Carries the original
    /// error and the component it came from.
    ExceptionOccurred {
        source: EventSource,
        error: Arc<DistributorError>,
    },
}

impl DistributorEvent {
    pub(crate) fn exception(source: EventSource, error: DistributorError) -> Self {
        Self::ExceptionOccurred {
            source,
            error: Arc::new(error),
        }
    }
}

/// Fan-out of [`DistributorEvent`]s to all registered listeners.
#[derive(Clone, Default)]
pub(crate) struct EventBus {
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<DistributorEvent>>>>,
}

impl EventBus {
    /// Register a new listener.
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<DistributorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Broadcast an event to every live listener, pruning closed ones.
    pub(crate) fn emit(&self, event: DistributorEvent) {
        self.lock()
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<DistributorEvent>>> {
        // Listener registration never panics while holding the lock, so
        // poisoning is unreachable; recover rather than propagate.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_listeners_is_a_noop() {
        let bus = EventBus::default();
        bus.emit(DistributorEvent::WorkItemsCleared);
    }

    #[tokio::test]
    async fn all_listeners_receive_each_event() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(DistributorEvent::WorkItemsCleared);

        assert!(matches!(
            first.recv().await,
            Some(DistributorEvent::WorkItemsCleared)
        ));
        assert!(matches!(
            second.recv().await,
            Some(DistributorEvent::WorkItemsCleared)
        ));
    }

    #[tokio::test]
    async fn dropped_listener_is_pruned_and_others_still_receive() {
        let bus = EventBus::default();
        let first = bus.subscribe();
        let mut second = bus.subscribe();
        drop(first);

        bus.emit(DistributorEvent::exception(
            EventSource::Slot(3),
            DistributorError::Dispatch("boom".into()),
        ));

        match second.recv().await {
            Some(DistributorEvent::ExceptionOccurred { source, error }) => {
                assert_eq!(source, EventSource::Slot(3));
                assert!(error.to_string().contains("boom"));
            }
            other => panic!("expected ExceptionOccurred, got {other:?}"),
        }
    }
}
