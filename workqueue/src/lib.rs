//! Blocking work queue with a completion barrier
//!
//! This crate provides the queue shared between the parsync orchestrator thread and its pool of
//! transfer workers. It is a FIFO with task accounting: every item that is enqueued must later
//! be marked done, and [`WorkQueue::join`] blocks until that has happened for all of them.
//!
//! # Overview
//!
//! The queue supports four core operations:
//!
//! 1. **enqueue** - append an item, blocking while a bounded queue is full
//! 2. **dequeue** - remove the oldest item, blocking while the queue is empty
//! 3. **mark done** - record that a previously dequeued item has been processed
//! 4. **join** - block until every enqueued item has been marked done
//!
//! Every item is delivered to exactly one consumer. Delivery is not completion: a consumer may
//! fail to process an item, but it must still mark it done or `join` never returns.
//!
//! # Usage Patterns
//!
//! ## Claiming items
//!
//! [`WorkQueue::claim`] wraps a dequeued item in a [`Claim`] guard that marks the item done when
//! dropped, so the accounting stays correct on every exit path of the consumer:
//!
//! ```rust
//! use std::sync::Arc;
//! use workqueue::WorkQueue;
//!
//! let queue = Arc::new(WorkQueue::<String>::new(0));
//! let worker = {
//!     let queue = Arc::clone(&queue);
//!     std::thread::spawn(move || {
//!         let mut seen = Vec::new();
//!         while let Some(claim) = queue.claim() {
//!             seen.push(claim.item().clone());
//!             // the item is marked done here, when `claim` goes out of scope
//!         }
//!         seen
//!     })
//! };
//! for path in ["/a", "/b", "/c"] {
//!     queue.enqueue(path.to_string()).unwrap();
//! }
//! queue.join();
//! queue.close();
//! assert_eq!(worker.join().unwrap(), vec!["/a", "/b", "/c"]);
//! ```
//!
//! ## Explicit accounting
//!
//! Consumers that do not want a guard call [`WorkQueue::dequeue`] and [`WorkQueue::mark_done`]
//! themselves:
//!
//! ```rust
//! use workqueue::WorkQueue;
//!
//! let queue = WorkQueue::new(0);
//! queue.enqueue(1).unwrap();
//! assert_eq!(queue.dequeue(), Some(1));
//! queue.mark_done().unwrap();
//! queue.join();
//! // marking more items done than were enqueued is an error
//! assert!(queue.mark_done().is_err());
//! ```
//!
//! # Shutdown
//!
//! Consumers block on `dequeue` when the queue is empty; they are not released just because the
//! queue drained. [`WorkQueue::close`] ends the queue's lifetime: pending and future `dequeue`
//! calls return `None` once the remaining items are gone, and `enqueue` fails.
//!
//! # Thread Safety
//!
//! All state lives behind one mutex with three condition variables (not empty, not full, all
//! done). The queue is `Sync` for any `Send` item type and is meant to be shared via `Arc`.

mod queue;

pub use queue::{Claim, QueueError, QueueStats, WorkQueue};
