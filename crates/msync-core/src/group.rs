use crate::error::Rejected;
use indexmap::IndexMap;

/// A buffered message: a timestamp and the opaque handle of its
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<H> {
    pub timestamp_ns: i64,
    pub handle: H,
}

impl<H> Entry<H> {
    pub fn new(timestamp_ns: i64, handle: H) -> Self {
        Self {
            timestamp_ns,
            handle,
        }
    }
}

/// A synchronized set holding exactly one entry per registered stream.
///
/// The anchor is the latest timestamp among the entries. Entries are
/// keyed by stream in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<H> {
    pub anchor_timestamp_ns: i64,
    pub entries: IndexMap<String, Entry<H>>,
}

impl<H> Group<H> {
    /// Get the handle delivered for a stream.
    pub fn get(&self, stream: &str) -> Option<&H> {
        self.entries.get(stream).map(|entry| &entry.handle)
    }

    /// Get the timestamp of the entry delivered for a stream.
    pub fn timestamp_of(&self, stream: &str) -> Option<i64> {
        self.entries.get(stream).map(|entry| entry.timestamp_ns)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, stream: &str) -> bool {
        self.entries.contains_key(stream)
    }

    /// Stream identifiers in registration order.
    pub fn streams(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The earliest timestamp among the entries.
    pub fn min_timestamp_ns(&self) -> i64 {
        self.entries
            .values()
            .map(|entry| entry.timestamp_ns)
            .min()
            .unwrap_or(self.anchor_timestamp_ns)
    }

    /// The spread between the earliest entry and the anchor.
    pub fn span_ns(&self) -> u64 {
        self.anchor_timestamp_ns.abs_diff(self.min_timestamp_ns())
    }

    /// Consume the group, keeping only the handles.
    pub fn into_handles(self) -> IndexMap<String, H> {
        self.entries
            .into_iter()
            .map(|(stream, entry)| (stream, entry.handle))
            .collect()
    }
}

/// Notice that a buffered entry was discarded. Ownership of the
/// handle returns to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction<H> {
    pub stream: String,
    pub timestamp_ns: i64,
    pub handle: H,
}

/// An item emitted by the [sync](crate::sync()) stream adapter.
#[derive(Debug)]
pub enum SyncEvent<H> {
    /// A synchronized group.
    Group(Group<H>),
    /// An entry evicted from a buffer.
    Evicted(Eviction<H>),
    /// An input item the synchronizer refused.
    Rejected(Rejected<H>),
}

impl<H> SyncEvent<H> {
    pub fn into_group(self) -> Option<Group<H>> {
        match self {
            SyncEvent::Group(group) => Some(group),
            _ => None,
        }
    }
}

/// The outcome of one [poll](crate::Synchronizer::poll) call.
///
/// Groups are in non-decreasing anchor order. Evictions are in the
/// order they occurred.
#[derive(Debug)]
pub struct PollOutput<H> {
    pub groups: Vec<Group<H>>,
    pub evictions: Vec<Eviction<H>>,
}

impl<H> Default for PollOutput<H> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            evictions: Vec::new(),
        }
    }
}

impl<H> PollOutput<H> {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.evictions.is_empty()
    }

    /// Flatten into events, evictions first.
    pub fn into_events(self) -> impl Iterator<Item = SyncEvent<H>> {
        self.evictions
            .into_iter()
            .map(SyncEvent::Evicted)
            .chain(self.groups.into_iter().map(SyncEvent::Group))
    }
}
