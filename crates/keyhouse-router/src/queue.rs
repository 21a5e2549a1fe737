//! Candidate Queue - Topics Awaiting a Dictionary Download
//!
//! An unbounded FIFO shared between the producers (the store change
//! listener and the retry timers) and the single consumer task. Duplicates
//! are allowed in the queue; the consumer filters them at dequeue time
//! against the in-flight registry and the compressor registry, which keeps
//! the queue itself trivial and lock-free for producers.
//!
//! `close()` makes a blocked `pop()` return `None` immediately; remaining
//! items are discarded. `remove()` deletes every queued copy of a topic,
//! used when a version retires.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Default)]
struct QueueState {
    items: VecDeque<String>,
    closed: bool,
}

/// Thread-safe FIFO of topics whose dictionaries need downloading.
#[derive(Default)]
pub struct CandidateQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a topic. Ignored after `close()`.
    pub fn push(&self, topic: String) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.items.push_back(topic);
        }
        self.notify.notify_one();
    }

    /// Append several topics. Ignored after `close()`.
    pub fn extend<I>(&self, topics: I)
    where
        I: IntoIterator<Item = String>,
    {
        let added = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            let before = state.items.len();
            state.items.extend(topics);
            state.items.len() > before
        };
        if added {
            self.notify.notify_one();
        }
    }

    /// Delete every queued copy of a topic.
    pub fn remove(&self, topic: &str) {
        self.lock().items.retain(|queued| queued != topic);
    }

    /// Close the queue and unpark the consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Take the next topic, waiting if the queue is empty. Returns `None`
    /// once the queue is closed.
    pub async fn pop(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register as a waiter before checking, so a push landing
            // between the check and the await still wakes us.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(topic) = state.items.pop_front() {
                    return Some(topic);
                }
            }

            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
