//! Round-robin selection.

use std::sync::atomic::{AtomicU64, Ordering};
use crate::error::{Error, Result};

/// Generic, thread-safe round-robin balancer over a fixed set of items.
///
/// Two concurrent calls to [`Balancer::next`] never observe the same cursor
/// position: N concurrent callers receive exactly the N positions following
/// the cursor, modulo the number of items.
#[derive(Debug)]
pub struct Balancer<T> {
    items: Box<[T]>,
    counter: AtomicU64,
}

impl<T> Balancer<T> {
    /// Create a balancer over `items`. Fails on an empty set.
    pub fn new(items: impl IntoIterator<Item = T>) -> Result<Self> {
        let items: Box<[T]> = items.into_iter().collect();
        if items.is_empty() {
            return Err(Error::EmptyBalancer);
        }

        Ok(Self {
            items,
            counter: AtomicU64::new(0),
        })
    }

    /// Item at the current cursor, without advancing.
    pub fn current(&self) -> &T {
        let idx = self.counter.load(Ordering::Relaxed);
        &self.items[self.slot(idx)]
    }

    /// Advance the cursor and return the item it pointed at.
    /// Wraps around to the first item after the last one.
    pub fn next(&self) -> &T {
        // fetch_add is the single indivisible step; a load/store pair would
        // hand the same slot to two callers.
        let idx = self.counter.fetch_add(1, Ordering::Relaxed);
        &self.items[self.slot(idx)]
    }

    /// Move the cursor back to the first item. Racing `next` calls get no
    /// ordering guarantee across the reset.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn slot(&self, idx: u64) -> usize {
        (idx % self.items.len() as u64) as usize
    }
}
