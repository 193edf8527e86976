//! The fetcher/sender ring buffer: the backpressure contract between the
//! fetch coroutine and the send coroutine inside one Sending Process.
//!
//! `SPEC_FULL.md` §4.4 requires this to be "two counting semaphores guarding
//! a fixed-size ring of slots" and explicitly forbids swapping it for an
//! unbounded channel. `tokio::sync::Semaphore` gives us exactly that: one
//! semaphore counts slots the fetcher may still fill (`free`), the other
//! counts slots the sender may still drain (`filled`). Neither coroutine
//! holds the guard mutex across an `.await`.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};

use crate::model::ReadingBatch;

/// A fixed-capacity ring of `ReadingBatch` slots shared between one fetcher
/// and one sender.
///
/// Cloning shares the same underlying ring (it is internally `Arc`-backed),
/// matching how the fetcher and sender tasks are spawned with a shared
/// handle rather than the ring itself.
#[derive(Clone)]
pub struct FetchSendRing {
    inner: Arc<Inner>,
}

struct Inner {
    /// Filled slots in FIFO order; never exceeds `capacity` entries because
    /// `free` bounds how many `push`es can outrun `pop`.
    slots: Mutex<VecDeque<ReadingBatch>>,
    /// Permits available to the fetcher: one per empty slot.
    free: Semaphore,
    /// Permits available to the sender: one per filled slot.
    filled: Semaphore,
    capacity: usize,
}

impl FetchSendRing {
    /// Creates a ring with `capacity` slots, all initially free.
    ///
    /// # Panics
    /// Panics if `capacity` is 0 — a zero-capacity ring can never hold a
    /// batch and indicates a misconfigured `memory_buffer_size`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(VecDeque::with_capacity(capacity)),
                free: Semaphore::new(capacity),
                filled: Semaphore::new(0),
                capacity,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Waits for a free slot, then stores `batch` in it.
    ///
    /// Called only by the fetcher. Acquires a `free` permit (blocking until
    /// one exists), pushes to the back of the queue without holding the
    /// mutex across an await, then releases a `filled` permit for the sender.
    pub async fn push(&self, batch: ReadingBatch) {
        let permit = self
            .inner
            .free
            .acquire()
            .await
            .expect("ring semaphore is never closed");
        permit.forget();

        let mut slots = self.inner.slots.lock().await;
        slots.push_back(batch);
        drop(slots);

        self.inner.filled.add_permits(1);
    }

    /// Waits for a filled slot, then removes and returns its batch.
    ///
    /// Called only by the sender. Mirrors `push` with the two semaphores
    /// swapped, draining from the front so batches leave in the order they
    /// were fetched.
    pub async fn pop(&self) -> ReadingBatch {
        let permit = self
            .inner
            .filled
            .acquire()
            .await
            .expect("ring semaphore is never closed");
        permit.forget();

        let mut slots = self.inner.slots.lock().await;
        let batch = slots
            .pop_front()
            .expect("a filled permit guarantees a ready slot");
        drop(slots);

        self.inner.free.add_permits(1);
        batch
    }
}

impl FetchSendRing {
    /// Whether the ring currently holds no batches (best-effort: the
    /// fetcher/sender only use this to decide whether to flush a pending
    /// checkpoint before blocking, never to gate correctness).
    pub async fn is_empty(&self) -> bool {
        self.inner.slots.lock().await.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reading;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn reading(id: i64) -> Reading {
        Reading {
            id,
            asset_code: "test".into(),
            read_key: format!("key-{id}"),
            user_ts: Utc::now(),
            reading: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn push_then_pop_round_trips() {
        let ring = FetchSendRing::new(2);
        ring.push(ReadingBatch::new(vec![reading(1), reading(2)]))
            .await;
        let batch = ring.pop().await;
        assert_eq!(batch.first_id(), Some(1));
        assert_eq!(batch.last_id(), Some(2));
    }

    #[tokio::test]
    async fn push_blocks_when_full() {
        let ring = FetchSendRing::new(1);
        ring.push(ReadingBatch::new(vec![reading(1)])).await;

        let ring2 = ring.clone();
        let blocked = tokio::spawn(async move {
            ring2.push(ReadingBatch::new(vec![reading(2)])).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        let first = ring.pop().await;
        assert_eq!(first.first_id(), Some(1));

        blocked.await.unwrap();
        let second = ring.pop().await;
        assert_eq!(second.first_id(), Some(2));
    }

    #[tokio::test]
    async fn fifo_ordering_under_concurrent_producer_and_consumer() {
        let ring = FetchSendRing::new(3);
        let producer_ring = ring.clone();
        let producer = tokio::spawn(async move {
            for id in 1..=10 {
                producer_ring.push(ReadingBatch::new(vec![reading(id)])).await;
            }
        });

        let mut seen = Vec::new();
        for _ in 0..10 {
            let batch = ring.pop().await;
            seen.push(batch.first_id().unwrap());
        }
        producer.await.unwrap();
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }
}
