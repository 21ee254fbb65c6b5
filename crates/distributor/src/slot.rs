//! Worker slots: one unit of execution capacity each.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::warn;

use crate::error::DistributorError;
use crate::event::{DistributorEvent, EventBus, EventSource};
use crate::source::WorkerAction;

/// One slot in the pool.
///
/// A slot is busy from the moment the dispatch cycle assigns it an item
/// until its action returns, successfully or not. Execution itself is
/// fire-and-forget: [`assign`](Self::assign) spawns a task and returns,
/// so the dispatch cycle is never blocked by item processing. Completion
/// clears the busy flag *before* signalling the re-trigger, so the cycle
/// that wakes up observes the slot as free.
pub struct WorkerSlot<T: Send + 'static> {
    index: usize,
    busy: Arc<AtomicBool>,
    action: Arc<dyn WorkerAction<T>>,
    events: EventBus,
    retrigger: Arc<Notify>,
}

impl<T: Send + 'static> WorkerSlot<T> {
    pub(crate) fn new(
        index: usize,
        action: Arc<dyn WorkerAction<T>>,
        events: EventBus,
        retrigger: Arc<Notify>,
    ) -> Self {
        Self {
            index,
            busy: Arc::new(AtomicBool::new(false)),
            action,
            events,
            retrigger,
        }
    }

    /// Position of this slot in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether an item is currently being processed on this slot.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Mark the slot busy and run `item` through the action on its own task.
    ///
    /// Callers must hold the dispatch-cycle lock and must have observed the
    /// slot as free — that is what makes the busy transition race-free.
    pub(crate) fn assign(&self, item: T) {
        self.busy.store(true, Ordering::Release);

        let index = self.index;
        let busy = Arc::clone(&self.busy);
        let action = Arc::clone(&self.action);
        let events = self.events.clone();
        let retrigger = Arc::clone(&self.retrigger);

        tokio::spawn(async move {
            // Run the action on a nested task so a panicking action
            // surfaces as a join error instead of leaving the slot busy.
            let result = match tokio::spawn(async move { action.execute(item).await }).await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::anyhow!("worker action panicked: {join_err}")),
            };

            busy.store(false, Ordering::Release);

            if let Err(err) = result {
                warn!(slot = index, error = %err, "worker action failed");
                events.emit(DistributorEvent::exception(
                    EventSource::Slot(index),
                    DistributorError::WorkerAction {
                        slot: index,
                        source: err,
                    },
                ));
            }

            retrigger.notify_one();
        });
    }
}
