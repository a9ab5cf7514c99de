use crate::group::Entry;
use std::collections::VecDeque;

/// A bounded queue of pending entries for one stream.
///
/// Entries are kept in arrival order, which is timestamp order as
/// long as the producer pushes non-decreasing timestamps. The buffer
/// never reorders: it appends at the tail and pops from the front.
#[derive(Debug)]
pub struct StreamBuffer<H> {
    buffer: VecDeque<Entry<H>>,
    capacity: usize,
    last_ts: Option<i64>,
    out_of_order: u64,
}

impl<H> StreamBuffer<H> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            last_ts: None,
            out_of_order: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn front(&self) -> Option<&Entry<H>> {
        self.buffer.front()
    }

    pub fn back(&self) -> Option<&Entry<H>> {
        self.buffer.back()
    }

    pub fn pop_front(&mut self) -> Option<Entry<H>> {
        self.buffer.pop_front()
    }

    /// Number of pushes whose timestamp was below the previously
    /// pushed one.
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order
    }

    /// Try to append an entry at the tail.
    ///
    /// Returns the handle back if the buffer is at capacity, leaving
    /// the buffer untouched. An entry older than the previous push is
    /// still appended as is; it is only counted.
    pub fn try_push(&mut self, timestamp_ns: i64, handle: H) -> Result<(), H> {
        if self.is_full() {
            return Err(handle);
        }

        match self.last_ts {
            Some(last_ts) if timestamp_ns < last_ts => self.out_of_order += 1,
            _ => {}
        }

        self.last_ts = Some(timestamp_ns);
        self.buffer.push_back(Entry::new(timestamp_ns, handle));
        Ok(())
    }

    /// Remove every entry, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Entry<H>> + '_ {
        self.buffer.drain(..)
    }
}
