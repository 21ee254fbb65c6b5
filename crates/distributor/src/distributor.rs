//! The dispatch core.
//!
//! [`Distributor`] owns a fixed pool of [`WorkerSlot`]s and drives the
//! polling loop: a spawned pump task runs one dispatch cycle per wake-up,
//! where a wake-up is either the poll-interval timer or a re-trigger from
//! a completing slot. Cycles are serialized by a single async mutex, so
//! free-slot accounting and assignment are atomic with respect to each
//! other and no slot can be handed two items before freeing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::error::DistributorError;
use crate::event::{DistributorEvent, EventBus, EventSource};
use crate::slot::WorkerSlot;
use crate::source::{WorkSource, WorkerAction};

/// Obtains work items in batches and distributes them to free worker slots.
///
/// Cloning yields another handle to the same pool. The distributor must be
/// created and started inside a tokio runtime; [`start`](Self::start)
/// spawns the pump task and [`stop`](Self::stop) should be called before
/// the last handle is discarded, otherwise the pump keeps polling.
///
/// # Example
/// ```ignore
/// let dist = Distributor::new(source, action, 8, Duration::from_secs(5))?;
/// let mut events = dist.subscribe();
/// dist.start();
/// while let Some(event) = events.recv().await {
///     // WorkItemsCleared / ExceptionOccurred
/// }
/// ```
pub struct Distributor<T: Send + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> Clone for Distributor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T: Send + 'static> {
    source: Arc<dyn WorkSource<T>>,
    slots: Vec<WorkerSlot<T>>,
    poll_interval: Duration,
    /// Serializes dispatch cycles. All free-slot reads and busy-flag sets
    /// happen under this lock.
    cycle_lock: Mutex<()>,
    running: AtomicBool,
    /// Pump generation. `start()` bumps it so stale pumps exit at their
    /// next wake-up instead of double-driving the pool.
    epoch: AtomicU64,
    /// Signalled by slot completions to request an immediate cycle.
    retrigger: Arc<Notify>,
    /// Signalled by `stop()` (and `start()` re-arming) to wake idle pumps.
    shutdown: Notify,
    events: EventBus,
}

impl<T: Send + 'static> Distributor<T> {
    /// Create a distributor with `pool_size` slots bound to `action`.
    ///
    /// Fails with [`DistributorError::Configuration`] if `pool_size` is
    /// zero. The pool size and poll interval are fixed for the lifetime of
    /// the distributor.
    pub fn new<S, A>(
        source: S,
        action: A,
        pool_size: usize,
        poll_interval: Duration,
    ) -> Result<Self, DistributorError>
    where
        S: WorkSource<T> + 'static,
        A: WorkerAction<T> + 'static,
    {
        if pool_size == 0 {
            return Err(DistributorError::Configuration(
                "pool size must be at least 1".into(),
            ));
        }

        let events = EventBus::default();
        let retrigger = Arc::new(Notify::new());
        let action: Arc<dyn WorkerAction<T>> = Arc::new(action);
        let slots = (0..pool_size)
            .map(|index| {
                WorkerSlot::new(
                    index,
                    Arc::clone(&action),
                    events.clone(),
                    Arc::clone(&retrigger),
                )
            })
            .collect();

        Ok(Self {
            inner: Arc::new(Inner {
                source: Arc::new(source),
                slots,
                poll_interval,
                cycle_lock: Mutex::new(()),
                running: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                retrigger,
                shutdown: Notify::new(),
                events,
            }),
        })
    }

    /// Begin distributing work.
    ///
    /// The first dispatch cycle runs immediately; later cycles run at most
    /// every poll interval, or sooner when a slot completes. Idempotent
    /// when already running: the timer is re-armed by replacing the pump
    /// task (cycles stay serialized either way).
    pub fn start(&self) {
        let epoch = self.inner.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.running.store(true, Ordering::Release);
        // Wake any previous pump so it notices it is stale.
        self.inner.shutdown.notify_waiters();

        info!(
            pool_size = self.inner.slots.len(),
            interval = ?self.inner.poll_interval,
            "starting distribution"
        );
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.pump(epoch).await;
        });
    }

    /// Halt future dispatch cycles.
    ///
    /// A cycle about to start becomes a no-op; a cycle already in progress
    /// and any in-flight item executions run to completion. Completions
    /// still free their slots but no longer trigger new cycles. Safe to
    /// call from inside a worker action.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Release);
        self.inner.shutdown.notify_waiters();
        info!("stopping distribution");
    }

    /// Suspend distribution. Alias of [`stop`](Self::stop); resume with
    /// [`start`](Self::start).
    pub fn pause(&self) {
        self.stop();
    }

    /// Register a listener for [`DistributorEvent`]s.
    ///
    /// Events are sent synchronously from the task that detected the
    /// condition. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> UnboundedReceiver<DistributorEvent> {
        self.inner.events.subscribe()
    }

    /// Whether the distributor is currently running.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Number of slots in the pool.
    pub fn pool_size(&self) -> usize {
        self.inner.slots.len()
    }

    /// Number of slots currently executing an item.
    pub fn busy_slots(&self) -> usize {
        self.inner.slots.iter().filter(|slot| slot.is_busy()).count()
    }

    /// The configured re-poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }
}

impl<T: Send + 'static> Inner<T> {
    /// Drive dispatch cycles until stopped or superseded.
    ///
    /// One cycle per wake-up; a wake-up is a timer tick, a slot-completion
    /// re-trigger, or a shutdown nudge. The running flag and epoch are
    /// re-checked after every wake so a stop observed mid-sleep takes
    /// effect before the next cycle.
    async fn pump(self: Arc<Self>, epoch: u64) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        // The interval's first tick completes immediately; consume it here
        // so the loop body below provides the immediate first cycle.
        ticker.tick().await;
        debug!(epoch, "dispatch pump started");

        loop {
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            if self.epoch.load(Ordering::Acquire) != epoch {
                // Superseded by a newer pump. The wake that got us here may
                // have consumed a completion re-trigger permit off the
                // shared Notify; forward it so the new pump is not left
                // sleeping until its next timer tick with work pending.
                self.retrigger.notify_one();
                break;
            }

            self.dispatch_cycle().await;

            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.retrigger.notified() => {}
                _ = self.shutdown.notified() => {}
            }
        }

        debug!(epoch, "dispatch pump exited");
    }

    /// One pass of: check capacity, pull work, assign.
    async fn dispatch_cycle(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        let _cycle = self.cycle_lock.lock().await;

        let free: Vec<usize> = self
            .slots
            .iter()
            .filter(|slot| !slot.is_busy())
            .map(|slot| slot.index())
            .collect();
        if free.is_empty() {
            return;
        }

        let items = match self.source.fetch(free.len()).await {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "work source failed, skipping cycle");
                self.events.emit(DistributorEvent::exception(
                    EventSource::Distributor,
                    DistributorError::WorkSource(err),
                ));
                return;
            }
        };

        if items.is_empty() {
            debug!(free_slots = free.len(), "no work available");
            self.events.emit(DistributorEvent::WorkItemsCleared);
            return;
        }

        if items.len() > free.len() {
            warn!(
                requested = free.len(),
                returned = items.len(),
                "work source returned more items than requested, dropping excess"
            );
        }

        let assigned = items.len().min(free.len());
        // zip truncates to the free-slot count, upholding the capacity
        // invariant even against a misbehaving source.
        for (index, item) in free.into_iter().zip(items) {
            self.slots[index].assign(item);
        }
        debug!(assigned, "assigned work items");
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Fluent builder for a [`Distributor`].
///
/// # Example
/// ```ignore
/// let dist = DistributorBuilder::new(source, action)
///     .pool_size(8)
///     .poll_interval(Duration::from_secs(5))
///     .build()?;
/// ```
pub struct DistributorBuilder<T: Send + 'static> {
    source: Arc<dyn WorkSource<T>>,
    action: Arc<dyn WorkerAction<T>>,
    pool_size: usize,
    poll_interval: Duration,
}

impl<T: Send + 'static> DistributorBuilder<T> {
    /// Create a builder with the default pool size (4) and poll
    /// interval (30s).
    pub fn new(
        source: impl WorkSource<T> + 'static,
        action: impl WorkerAction<T> + 'static,
    ) -> Self {
        Self {
            source: Arc::new(source),
            action: Arc::new(action),
            pool_size: 4,
            poll_interval: Duration::from_secs(30),
        }
    }

    /// Set the number of worker slots.
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the re-poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build the distributor, validating the configuration.
    pub fn build(self) -> Result<Distributor<T>, DistributorError> {
        Distributor::new(self.source, self.action, self.pool_size, self.poll_interval)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
