//! Per-connection request coalescing
//!
//! A `Coalescer` keeps at most one in-flight computation per connection key.
//! Callers that arrive while it runs await the same shared handle. The work
//! itself is spawned, so a caller that goes away does not stall the others.
//!
//! Successful results can optionally be kept for a retention window so a
//! burst of callers arriving just after completion still shares them.
//! Failures are never kept.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{CacheError, CacheResult};
use crate::key::ConnectionKey;

/// Result of the work together with when it settled
type SharedResult<T> = Shared<BoxFuture<'static, (CacheResult<T>, Instant)>>;

struct Slot<T: Clone> {
    id: u64,
    future: SharedResult<T>,
}

impl<T: Clone> Slot<T> {
    fn is_reusable(&self, retain: Duration) -> bool {
        match self.future.peek() {
            None => true,
            Some((Ok(_), settled_at)) => settled_at.elapsed() < retain,
            Some((Err(_), _)) => false,
        }
    }

    fn is_settled(&self) -> bool {
        self.future.peek().is_some()
    }
}

pub struct Coalescer<T: Clone> {
    kind: &'static str,
    retain: Duration,
    slots: Mutex<HashMap<ConnectionKey, Slot<T>>>,
    next_id: AtomicU64,
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// `kind` only labels log lines; `retain` of zero drops results on settle
    pub fn new(kind: &'static str, retain: Duration) -> Self {
        Self {
            kind,
            retain,
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Await the in-flight (or retained) result for `key`, starting `work`
    /// only when there is none
    pub async fn run<F>(&self, key: &ConnectionKey, work: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>> + Send + 'static,
    {
        let (id, future) = self.join_or_start(key, work);
        let (result, _) = future.await;
        self.settle(key, id);
        result
    }

    fn join_or_start<F>(&self, key: &ConnectionKey, work: F) -> (u64, SharedResult<T>)
    where
        F: Future<Output = CacheResult<T>> + Send + 'static,
    {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            if slot.is_reusable(self.retain) {
                tracing::trace!(kind = self.kind, connection = %key, "joining in-flight work");
                return (slot.id, slot.future.clone());
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(work);
        let future = async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => Err(CacheError::from(err)),
            };
            (result, Instant::now())
        }
        .boxed()
        .shared();

        tracing::trace!(kind = self.kind, connection = %key, "started work");
        slots.insert(
            key.clone(),
            Slot {
                id,
                future: future.clone(),
            },
        );
        (id, future)
    }

    /// Drop the slot once its result can no longer be handed out
    fn settle(&self, key: &ConnectionKey, id: u64) {
        let mut slots = self.slots.lock();
        // A slot replaced or forgotten in the meantime is left alone
        if let Some(slot) = slots.get(key) {
            if slot.id == id && !slot.is_reusable(self.retain) {
                slots.remove(key);
            }
        }
    }

    /// Drop whatever is held for `key`; current waiters keep their handle
    pub fn forget(&self, key: &ConnectionKey) {
        self.slots.lock().remove(key);
    }

    /// Drop a retained result for `key`, leaving running work to be joined
    pub fn forget_settled(&self, key: &ConnectionKey) {
        let mut slots = self.slots.lock();
        if slots.get(key).is_some_and(Slot::is_settled) {
            slots.remove(key);
        }
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Number of computations still running
    pub fn in_flight(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| !slot.is_settled())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use zqlz_core::ZqlzError;

    fn counted(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = CacheResult<u32>> + Send + 'static {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let coalescer = Coalescer::new("test", Duration::ZERO);
        let key = ConnectionKey::new("srv", "db");
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            coalescer.run(&key, counted(&calls, 1)),
            coalescer.run(&key, counted(&calls, 2)),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_zero_retention_reruns_after_settle() {
        let coalescer = Coalescer::new("test", Duration::ZERO);
        let key = ConnectionKey::new("srv", "db");
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(coalescer.run(&key, counted(&calls, 1)).await.unwrap(), 1);
        assert_eq!(coalescer.run(&key, counted(&calls, 2)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retained_result_expires() {
        let coalescer = Coalescer::new("test", Duration::from_secs(120));
        let key = ConnectionKey::new("srv", "db");
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(coalescer.run(&key, counted(&calls, 1)).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(coalescer.run(&key, counted(&calls, 2)).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(coalescer.run(&key, counted(&calls, 3)).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_retained() {
        let coalescer: Coalescer<u32> = Coalescer::new("test", Duration::from_secs(120));
        let key = ConnectionKey::new("srv", "db");

        let failed = coalescer
            .run(&key, async { Err(ZqlzError::Query("boom".into()).into()) })
            .await;
        assert!(matches!(failed, Err(CacheError::Source(_))));

        let calls = Arc::new(AtomicUsize::new(0));
        assert_eq!(coalescer.run(&key, counted(&calls, 5)).await.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forget_starts_fresh_work() {
        let coalescer = Coalescer::new("test", Duration::from_secs(120));
        let key = ConnectionKey::new("srv", "db");
        let calls = Arc::new(AtomicUsize::new(0));

        coalescer.run(&key, counted(&calls, 1)).await.unwrap();
        coalescer.forget(&key);
        assert_eq!(coalescer.run(&key, counted(&calls, 2)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_forget_settled_joins_running_work() {
        let coalescer = Arc::new(Coalescer::new("test", Duration::from_secs(120)));
        let key = ConnectionKey::new("srv", "db");
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let coalescer = coalescer.clone();
            let key = key.clone();
            let work = counted(&calls, 1);
            tokio::spawn(async move { coalescer.run(&key, work).await })
        };
        tokio::task::yield_now().await;
        coalescer.forget_settled(&key);
        let second = coalescer.run(&key, counted(&calls, 2)).await.unwrap();

        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Settled now, so the retained value is dropped
        coalescer.forget_settled(&key);
        assert_eq!(coalescer.run(&key, counted(&calls, 3)).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let coalescer = Coalescer::new("test", Duration::from_secs(120));
        let calls = Arc::new(AtomicUsize::new(0));

        let key_one = ConnectionKey::new("srv", "one");
        let key_two = ConnectionKey::new("srv", "two");
        let (a, b) = tokio::join!(
            coalescer.run(&key_one, counted(&calls, 1)),
            coalescer.run(&key_two, counted(&calls, 2)),
        );
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
