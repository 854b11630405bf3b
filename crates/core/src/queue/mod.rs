//! Ordered transfer queue with FIFO semantics and bulk append.

use std::collections::VecDeque;

/// FIFO queue of pending transfers.
///
/// No internal locking: the queue has a single owner (the offloader) between
/// rebuilds and is replaced wholesale, never patched.
#[derive(Debug, Clone)]
pub struct TransferQueue<T> {
    items: VecDeque<T>,
}

impl<T> Default for TransferQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TransferQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Appends a single item to the back of the queue.
    pub fn enqueue(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// Appends all items in order.
    pub fn enqueue_all(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// Removes and returns the head of the queue.
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Returns a reference to the head without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Removes all items.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no items are queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Clone> TransferQueue<T> {
    /// Returns an immutable copy of the queued items, head first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// Returns up to `n` items from the head, for bounded status previews.
    pub fn preview(&self, n: usize) -> Vec<T> {
        self.items.iter().take(n).cloned().collect()
    }
}
