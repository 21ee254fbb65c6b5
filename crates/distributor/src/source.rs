//! Work source and worker action traits.
//!
//! The two callables the distributor consumes: a [`WorkSource`] it polls
//! for batches of opaque items, and a [`WorkerAction`] each slot runs
//! against a single item. Both may fail; failures are recovered by the
//! core and reported through the event stream.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// External supplier of work items, polled on demand.
///
/// Implementations must tolerate being polled repeatedly, including when
/// they have nothing to hand out. A call may return fewer items than
/// `max_items` (including zero), never more — the distributor drops any
/// excess rather than over-commit its pool.
#[async_trait]
pub trait WorkSource<T: Send + 'static>: Send + Sync {
    /// Fetch up to `max_items` work items.
    async fn fetch(&self, max_items: usize) -> anyhow::Result<Vec<T>>;
}

/// Per-item processing logic, run by a worker slot.
///
/// May block for arbitrary external reasons; the dispatch cycle never
/// waits on it. Must eventually return — the core imposes no timeout.
#[async_trait]
pub trait WorkerAction<T: Send + 'static>: Send + Sync {
    /// Process one work item.
    async fn execute(&self, item: T) -> anyhow::Result<()>;
}

/// Blanket implementation so `Arc<dyn WorkSource<T>>` can be used directly.
#[async_trait]
impl<T: Send + 'static, S: WorkSource<T> + ?Sized> WorkSource<T> for Arc<S> {
    async fn fetch(&self, max_items: usize) -> anyhow::Result<Vec<T>> {
        (**self).fetch(max_items).await
    }
}

/// Blanket implementation so `Arc<dyn WorkerAction<T>>` can be used directly.
#[async_trait]
impl<T: Send + 'static, A: WorkerAction<T> + ?Sized> WorkerAction<T> for Arc<A> {
    async fn execute(&self, item: T) -> anyhow::Result<()> {
        (**self).execute(item).await
    }
}

/// Wrap an async closure as a [`WorkSource`].
pub fn fn_source<T, F, Fut>(f: F) -> impl WorkSource<T>
where
    T: Send + 'static,
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
{
    FnSource(f)
}

/// Wrap an async closure as a [`WorkerAction`].
pub fn fn_action<T, F, Fut>(f: F) -> impl WorkerAction<T>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnAction(f)
}

struct FnSource<F>(F);

#[async_trait]
impl<T, F, Fut> WorkSource<T> for FnSource<F>
where
    T: Send + 'static,
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
{
    async fn fetch(&self, max_items: usize) -> anyhow::Result<Vec<T>> {
        (self.0)(max_items).await
    }
}

struct FnAction<F>(F);

#[async_trait]
impl<T, F, Fut> WorkerAction<T> for FnAction<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn execute(&self, item: T) -> anyhow::Result<()> {
        (self.0)(item).await
    }
}
