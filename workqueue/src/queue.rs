use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("work queue is closed")]
    Closed,
    #[error("mark_done called without a matching dequeue (enqueued: {enqueued}, done: {done})")]
    TooManyDone { enqueued: u64, done: u64 },
}

/// Snapshot of the queue accounting counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items ever enqueued
    pub enqueued: u64,
    /// Items handed out to consumers
    pub dequeued: u64,
    /// Items marked done
    pub done: u64,
    /// Items currently waiting in the queue
    pub queued: usize,
}

impl QueueStats {
    /// Items enqueued but not yet marked done
    pub fn unfinished(&self) -> u64 {
        self.enqueued - self.done
    }
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    enqueued: u64,
    dequeued: u64,
    done: u64,
    closed: bool,
}

/// FIFO of pending work with a completion barrier, see the crate documentation
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    all_done: Condvar,
    capacity: usize,
}

impl<T> WorkQueue<T> {
    /// Create a queue holding at most `capacity` waiting items, 0 means unbounded
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                enqueued: 0,
                dequeued: 0,
                done: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            all_done: Condvar::new(),
            capacity,
        }
    }

    // no code path panics while holding the lock, so a poisoned state is still consistent
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(
        &self,
        condvar: &Condvar,
        guard: MutexGuard<'a, State<T>>,
    ) -> MutexGuard<'a, State<T>> {
        condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an item, blocking while a bounded queue is full
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue was closed before the item could be added.
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        let mut state = self.lock();
        while self.capacity > 0 && state.items.len() >= self.capacity && !state.closed {
            state = self.wait(&self.not_full, state);
        }
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.items.push_back(item);
        state.enqueued += 1;
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, blocking while the queue is empty
    ///
    /// Returns `None` only after the queue was closed and every remaining item was handed out.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                state.dequeued += 1;
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self.wait(&self.not_empty, state);
        }
    }

    /// Like [`WorkQueue::dequeue`], but the item is marked done when the returned guard drops
    pub fn claim(&self) -> Option<Claim<'_, T>> {
        self.dequeue().map(|item| Claim { queue: self, item })
    }

    /// Record that one dequeued item has been processed
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TooManyDone`] if there is no dequeued item left to account for.
    pub fn mark_done(&self) -> Result<(), QueueError> {
        let mut state = self.lock();
        if state.done >= state.dequeued {
            return Err(QueueError::TooManyDone {
                enqueued: state.enqueued,
                done: state.done,
            });
        }
        state.done += 1;
        if state.done == state.enqueued {
            self.all_done.notify_all();
        }
        Ok(())
    }

    /// Block until every enqueued item has been marked done
    pub fn join(&self) {
        let mut state = self.lock();
        while state.done < state.enqueued {
            state = self.wait(&self.all_done, state);
        }
    }

    /// Stop accepting items and release consumers blocked on an empty queue
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            enqueued: state.enqueued,
            dequeued: state.dequeued,
            done: state.done,
            queued: state.items.len(),
        }
    }
}

/// A dequeued item that is marked done when dropped
#[derive(Debug)]
pub struct Claim<'a, T> {
    queue: &'a WorkQueue<T>,
    item: T,
}

impl<T> Claim<'_, T> {
    pub fn item(&self) -> &T {
        &self.item
    }
}

impl<T> Drop for Claim<'_, T> {
    fn drop(&mut self) {
        if let Err(error) = self.queue.mark_done() {
            // unreachable while claims are the only consumer of mark_done
            tracing::error!("failed to mark claimed item done: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn spawn_claimers(
        queue: &Arc<WorkQueue<u64>>,
        workers: usize,
    ) -> Vec<std::thread::JoinHandle<Vec<u64>>> {
        (0..workers)
            .map(|_| {
                let queue = Arc::clone(queue);
                std::thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(claim) = queue.claim() {
                        seen.push(*claim.item());
                    }
                    seen
                })
            })
            .collect()
    }

    #[test]
    fn fifo_order() {
        let queue = WorkQueue::new(0);
        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }
        let drained: Vec<_> = (0..5).map(|_| queue.dequeue().unwrap()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn join_on_empty_queue_returns() {
        let queue: WorkQueue<u64> = WorkQueue::new(0);
        queue.join();
        assert_eq!(queue.stats(), QueueStats::default());
    }

    #[test]
    fn mark_done_needs_a_dequeued_item() {
        let queue = WorkQueue::new(0);
        assert_eq!(
            queue.mark_done(),
            Err(QueueError::TooManyDone {
                enqueued: 0,
                done: 0
            })
        );
        queue.enqueue("a").unwrap();
        // enqueued but not handed out yet
        assert!(queue.mark_done().is_err());
        assert_eq!(queue.dequeue(), Some("a"));
        queue.mark_done().unwrap();
        assert!(queue.mark_done().is_err());
        let stats = queue.stats();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.done, 1);
    }

    #[test]
    fn enqueue_after_close_fails() {
        let queue = WorkQueue::new(0);
        queue.enqueue(1).unwrap();
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.enqueue(2), Err(QueueError::Closed));
        // items queued before close are still handed out
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn close_releases_blocked_consumers() {
        let queue: Arc<WorkQueue<u64>> = Arc::new(WorkQueue::new(0));
        let handles = spawn_claimers(&queue, 4);
        std::thread::sleep(std::time::Duration::from_millis(50));
        queue.close();
        for handle in handles {
            assert!(handle.join().unwrap().is_empty());
        }
    }

    #[test]
    fn claim_marks_done_on_early_return() {
        fn process(queue: &WorkQueue<u64>) -> Result<(), String> {
            let claim = queue.claim().ok_or("closed")?;
            if *claim.item() == 7 {
                return Err("bad item".to_string());
            }
            Ok(())
        }
        let queue = WorkQueue::new(0);
        queue.enqueue(7).unwrap();
        assert!(process(&queue).is_err());
        queue.join();
        assert_eq!(queue.stats().unfinished(), 0);
    }

    #[test]
    fn bounded_queue_blocks_producer() {
        let queue: Arc<WorkQueue<u64>> = Arc::new(WorkQueue::new(2));
        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for i in 0..10 {
                    queue.enqueue(i).unwrap();
                }
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        // producer is stuck behind the capacity limit
        assert_eq!(queue.stats().queued, 2);
        let handles = spawn_claimers(&queue, 1);
        producer.join().unwrap();
        queue.join();
        queue.close();
        let seen: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn each_item_delivered_once() {
        let queue: Arc<WorkQueue<u64>> = Arc::new(WorkQueue::new(0));
        let handles = spawn_claimers(&queue, 8);
        for i in 0..1000 {
            queue.enqueue(i).unwrap();
        }
        queue.join();
        queue.close();
        let mut seen: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..1000).collect::<Vec<_>>());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn join_balances_accounting(workers in 1usize..8, items in 0u64..200) {
            let queue: Arc<WorkQueue<u64>> = Arc::new(WorkQueue::new(0));
            let handles = spawn_claimers(&queue, workers);
            for i in 0..items {
                queue.enqueue(i).unwrap();
            }
            queue.join();
            let stats = queue.stats();
            prop_assert_eq!(stats.enqueued, items);
            prop_assert_eq!(stats.done, items);
            prop_assert_eq!(stats.queued, 0);
            queue.close();
            for handle in handles {
                handle.join().unwrap();
            }
        }
    }
}
