//! Single-slot latest-value cell
//!
//! One writer overwrites, any number of readers take the freshest value.
//! Values are swapped as whole `Arc`s, so a reader never observes a partially
//! written value and never blocks the writer for longer than a pointer swap.

use std::sync::Arc;

use tokio::sync::watch;

/// Latest-value cell shared between a producer and its readers
///
/// Cloning the cell yields another handle to the same slot.
#[derive(Debug)]
pub struct LatestCell<T> {
    tx: Arc<watch::Sender<Option<Arc<T>>>>,
}

impl<T> Clone for LatestCell<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Default for LatestCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestCell<T> {
    /// Create an empty cell
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current value
    ///
    /// Works whether or not anyone is subscribed.
    pub fn publish(&self, value: T) {
        self.publish_arc(Arc::new(value));
    }

    /// Replace the current value with an already shared one
    pub fn publish_arc(&self, value: Arc<T>) {
        self.tx.send_replace(Some(value));
    }

    /// Freshest value, `None` until the first publish
    pub fn latest(&self) -> Option<Arc<T>> {
        self.tx.borrow().clone()
    }

    pub fn has_value(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Change notifications; the receiver starts at the current value
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.tx.subscribe()
    }
}
