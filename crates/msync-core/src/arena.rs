//! Caller-side payload storage.
//!
//! The synchronizer moves opaque handles around and never touches the
//! payloads behind them. [PayloadArena] is one way for a producer to
//! own those payloads: it stores each payload in a slot and hands out
//! a small [Handle] that can be pushed into the synchronizer. When a
//! handle comes back in a group or an eviction, the payload is taken
//! out of the arena.
//!
//! Handles carry a generation number, so a handle whose slot was
//! already taken and reused resolves to nothing instead of to a
//! different payload.

use parking_lot::Mutex;
use slab::Slab;

/// A token referring to a payload in a [PayloadArena].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    key: usize,
    generation: u64,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    payload: T,
}

#[derive(Debug)]
struct Inner<T> {
    slots: Slab<Slot<T>>,
    next_generation: u64,
}

/// Slab-backed storage for payloads referenced by [Handle]s.
///
/// The arena is internally locked and can be shared between producer
/// and consumer threads.
#[derive(Debug)]
pub struct PayloadArena<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for PayloadArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PayloadArena<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: Slab::with_capacity(capacity),
                next_generation: 0,
            }),
        }
    }

    /// Store a payload and return its handle.
    pub fn insert(&self, payload: T) -> Handle {
        let mut inner = self.inner.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;

        let key = inner.slots.insert(Slot {
            generation,
            payload,
        });
        Handle { key, generation }
    }

    /// Remove and return the payload of a handle.
    pub fn take(&self, handle: Handle) -> Option<T> {
        let mut inner = self.inner.lock();
        match inner.slots.get(handle.key) {
            Some(slot) if slot.generation == handle.generation => {}
            _ => return None,
        }
        Some(inner.slots.remove(handle.key).payload)
    }

    /// Run a closure on the payload of a handle.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&T) -> R) -> Option<R> {
        let inner = self.inner.lock();
        inner
            .slots
            .get(handle.key)
            .filter(|slot| slot.generation == handle.generation)
            .map(|slot| f(&slot.payload))
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.with(handle, |_| ()).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().slots.is_empty()
    }
}

impl<T: Clone> PayloadArena<T> {
    /// Get a copy of the payload of a handle.
    pub fn get(&self, handle: Handle) -> Option<T> {
        self.with(handle, T::clone)
    }
}
