//! Task queue backed by a `VecDeque`.
//!
//! One producer side (request handlers) and one consumer (the worker).
//! Position lookups only take the read lock, so concurrent status polls
//! never wait on each other. A position is a hint: it may be stale by one
//! element if the worker dequeues while a lookup is in flight.

use std::collections::VecDeque;

use tokio::sync::{Notify, RwLock};
use tracing::debug;

use talkie_models::{QueueEntry, TaskId};

/// Unbounded FIFO queue of pending jobs.
#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: RwLock<VecDeque<QueueEntry>>,
    available: Notify,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to the tail, returning its zero-based position.
    pub async fn enqueue(&self, entry: QueueEntry) -> usize {
        let position = {
            let mut entries = self.entries.write().await;
            debug!(task_id = %entry.task_id, "Enqueued task");
            entries.push_back(entry);
            entries.len() - 1
        };
        // Stores a permit when the worker is not parked yet.
        self.available.notify_one();
        position
    }

    /// Remove and return the head, waiting until one is available.
    ///
    /// Cancel-safe: an entry is only removed in the same poll that
    /// returns it.
    pub async fn dequeue(&self) -> QueueEntry {
        loop {
            if let Some(entry) = self.entries.write().await.pop_front() {
                debug!(task_id = %entry.task_id, "Dequeued task");
                return entry;
            }
            self.available.notified().await;
        }
    }

    /// Remove the head without waiting.
    pub async fn try_dequeue(&self) -> Option<QueueEntry> {
        self.entries.write().await.pop_front()
    }

    /// Zero-based position of a queued task, `None` once it left the queue.
    pub async fn position_of(&self, task_id: &TaskId) -> Option<usize> {
        self.entries
            .read()
            .await
            .iter()
            .position(|entry| &entry.task_id == task_id)
    }

    /// Number of queued entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the queue is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    fn entry(id: &str) -> QueueEntry {
        QueueEntry::new(TaskId::from(id), format!("{id}.png"), format!("{id}.wav"))
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = TaskQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(entry(id)).await;
        }

        assert_eq!(queue.dequeue().await.task_id.as_str(), "a");
        assert_eq!(queue.dequeue().await.task_id.as_str(), "b");
        assert_eq!(queue.dequeue().await.task_id.as_str(), "c");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_position_of() {
        let queue = TaskQueue::new();
        assert_eq!(queue.enqueue(entry("a")).await, 0);
        assert_eq!(queue.enqueue(entry("b")).await, 1);
        assert_eq!(queue.enqueue(entry("c")).await, 2);

        assert_eq!(queue.position_of(&TaskId::from("c")).await, Some(2));
        assert_eq!(queue.position_of(&TaskId::from("zzz")).await, None);

        queue.dequeue().await;
        assert_eq!(queue.position_of(&TaskId::from("a")).await, None);
        assert_eq!(queue.position_of(&TaskId::from("c")).await, Some(1));
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn test_try_dequeue_empty() {
        let queue = TaskQueue::new();
        assert!(queue.try_dequeue().await.is_none());
        queue.enqueue(entry("a")).await;
        assert_eq!(queue.try_dequeue().await.unwrap().task_id.as_str(), "a");
    }

    #[test]
    fn test_dequeue_waits_for_enqueue() {
        let queue = TaskQueue::new();
        let mut dequeue = task::spawn(queue.dequeue());
        assert_pending!(dequeue.poll());

        let mut enqueue = task::spawn(queue.enqueue(entry("late")));
        assert_ready!(enqueue.poll());
        drop(enqueue);

        assert!(dequeue.is_woken());
        let got = assert_ready!(dequeue.poll());
        assert_eq!(got.task_id.as_str(), "late");
    }

    #[tokio::test]
    async fn test_blocked_consumer_receives_in_order() {
        let queue = Arc::new(TaskQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..5 {
                    seen.push(queue.dequeue().await.task_id.0);
                }
                seen
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        for i in 0..5 {
            queue.enqueue(entry(&format!("t{i}"))).await;
        }

        let seen = tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, vec!["t0", "t1", "t2", "t3", "t4"]);
    }
}
