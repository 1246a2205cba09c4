//! The FIFO queue between the reader and a consumer.
//!
//! The queue is the only state the two tasks share. The reader enqueues
//! posts in file order; the consumer periodically drains everything that
//! accumulated. Cloning a queue shares the underlying storage.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// A thread-safe, multi-producer single-consumer FIFO queue.
#[derive(Debug)]
pub struct PostQueue<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Clone for PostQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for PostQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PostQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Adds an item to the end of the queue.
    pub fn enqueue(&self, item: T) {
        match self.inner.lock() {
            Ok(mut queue) => queue.push_back(item),
            Err(e) => warn!("Failed to enqueue item: lock poisoned: {}", e),
        }
    }

    /// Adds many items to the end of the queue, preserving their order.
    pub fn enqueue_all<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        match self.inner.lock() {
            Ok(mut queue) => queue.extend(items),
            Err(e) => warn!("Failed to enqueue items: lock poisoned: {}", e),
        }
    }

    /// Removes and returns the first item, or `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        match self.inner.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(e) => {
                warn!("Failed to dequeue item: lock poisoned: {}", e);
                None
            }
        }
    }

    /// Removes and returns every item, oldest first.
    pub fn dequeue_all(&self) -> Vec<T> {
        match self.inner.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(e) => {
                warn!("Failed to drain queue: lock poisoned: {}", e);
                Vec::new()
            }
        }
    }

    /// Returns the number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    /// Checks whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every queued item.
    pub fn clear(&self) {
        if let Ok(mut queue) = self.inner.lock() {
            queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let queue = PostQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);

        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn dequeue_all_empties_the_queue() {
        let queue = PostQueue::new();
        queue.enqueue_all([1, 2, 3]);

        assert_eq!(queue.dequeue_all(), vec![1, 2, 3]);
        assert!(queue.is_empty());
        assert!(queue.dequeue_all().is_empty());
    }

    #[test]
    fn clones_share_state() {
        let queue = PostQueue::new();
        let other = queue.clone();

        queue.enqueue(1);
        assert_eq!(other.len(), 1);

        other.dequeue();
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_discards_items() {
        let queue = PostQueue::new();
        queue.enqueue_all([1, 2]);
        queue.clear();
        assert!(queue.is_empty());
    }
}
