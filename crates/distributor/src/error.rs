//! Distributor error types.

use thiserror::Error;

/// Errors raised by the dispatch core or forwarded from its collaborators.
///
/// After construction, none of these are returned to the caller directly —
/// they travel through the [`ExceptionOccurred`](crate::DistributorEvent)
/// event stream instead.
#[derive(Debug, Error)]
pub enum DistributorError {
    /// Invalid construction parameters. Fatal to construction only.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The work source failed while being polled. The cycle that observed
    /// it proceeds as if no work was available.
    #[error("work source error: {0}")]
    WorkSource(#[source] anyhow::Error),

    /// A worker action failed (or panicked) while processing an item.
    /// The slot recovers to idle.
    #[error("worker action error on slot {slot}: {source}")]
    WorkerAction {
        slot: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Unexpected failure in the dispatch cycle's own bookkeeping.
    #[error("dispatch error: {0}")]
    Dispatch(String),
}
