use futures::{
    Stream,
    stream::{self, TryStreamExt},
};
use msync_core::{Config, Eviction, Group, Rejected, SyncEvent, sync};
use std::{collections::HashSet, time::Duration};

pub const MS: i64 = 1_000_000;

/// StreamBuilder for creating test input with various characteristics.
///
/// Each message gets a unique handle: its index in insertion order.
#[allow(dead_code)]
pub struct StreamBuilder<K> {
    messages: Vec<(K, i64, usize)>,
}

impl<K> Default for StreamBuilder<K> {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
        }
    }
}

impl<K> StreamBuilder<K>
where
    K: Clone,
{
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn add_message(mut self, key: K, timestamp_ms: i64) -> Self {
        let handle = self.messages.len();
        self.messages.push((key, timestamp_ms * MS, handle));
        self
    }

    #[allow(dead_code)]
    pub fn add_messages(mut self, key: K, timestamps_ms: &[i64]) -> Self {
        for &ts in timestamps_ms {
            self = self.add_message(key.clone(), ts);
        }
        self
    }

    /// Number of messages added so far.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Reorder messages by timestamp, the way they would arrive from
    /// live sensors. Ties keep insertion order.
    #[allow(dead_code)]
    pub fn sort_by_time(mut self) -> Self {
        self.messages.sort_by_key(|&(_, ts, _)| ts);
        self
    }

    #[allow(dead_code)]
    pub fn build(self) -> impl Stream<Item = eyre::Result<(K, i64, usize)>> + Unpin + Send
    where
        K: Send,
    {
        stream::iter(self.messages.into_iter().map(Ok))
    }
}

/// Everything the synchronizer handed back for one run.
#[derive(Debug, Default)]
pub struct Outcome {
    pub groups: Vec<Group<usize>>,
    pub evictions: Vec<Eviction<usize>>,
    pub rejected: Vec<Rejected<usize>>,
}

impl Outcome {
    /// Anchor timestamps in milliseconds.
    #[allow(dead_code)]
    pub fn anchors_ms(&self) -> Vec<i64> {
        self.groups
            .iter()
            .map(|group| group.anchor_timestamp_ns / MS)
            .collect()
    }
}

/// Helper function to run the stream adapter and collect all events.
#[allow(dead_code)]
pub async fn run_sync<K>(
    input_stream: impl Stream<Item = eyre::Result<(K, i64, usize)>> + Unpin + Send,
    keys: impl IntoIterator<Item = K>,
    config: Config,
) -> eyre::Result<Outcome>
where
    K: AsRef<str> + Into<String>,
{
    let events: Vec<SyncEvent<usize>> = sync(input_stream, keys, config)?.try_collect().await?;

    let mut outcome = Outcome::default();
    for event in events {
        match event {
            SyncEvent::Group(group) => outcome.groups.push(group),
            SyncEvent::Evicted(eviction) => outcome.evictions.push(eviction),
            SyncEvent::Rejected(rejected) => outcome.rejected.push(rejected),
        }
    }
    Ok(outcome)
}

/// Timestamp in milliseconds of the entry a group holds for a stream.
#[allow(dead_code)]
pub fn ts_ms(group: &Group<usize>, stream: &str) -> i64 {
    group.timestamp_of(stream).unwrap() / MS
}

/// Assert that groups are complete and fit in the window.
#[allow(dead_code)]
pub fn assert_groups_valid(groups: &[Group<usize>], streams: &[&str], window_size: Duration) {
    let window_ns = window_size.as_nanos() as u64;

    for group in groups {
        assert_eq!(group.len(), streams.len(), "Group should hold every stream");
        for stream in streams {
            assert!(group.contains(stream), "Group is missing stream {stream}");
        }

        let max_ts = group
            .entries
            .values()
            .map(|entry| entry.timestamp_ns)
            .max()
            .unwrap();
        assert_eq!(group.anchor_timestamp_ns, max_ts);

        assert!(
            group.span_ns() <= window_ns,
            "Entries in group exceed window size: span={}ns, window={}ns",
            group.span_ns(),
            window_ns
        );
    }
}

/// Assert that groups are in anchor order.
#[allow(dead_code)]
pub fn assert_timestamp_ordering(groups: &[Group<usize>]) {
    for pair in groups.windows(2) {
        assert!(
            pair[0].anchor_timestamp_ns <= pair[1].anchor_timestamp_ns,
            "Groups not in timestamp order: prev={}, current={}",
            pair[0].anchor_timestamp_ns,
            pair[1].anchor_timestamp_ns
        );
    }
}

/// Assert that every handle in `0..total` came back exactly once.
#[allow(dead_code)]
pub fn assert_all_accounted(outcome: &Outcome, total: usize) {
    let handles = outcome
        .groups
        .iter()
        .flat_map(|group| group.entries.values().map(|entry| entry.handle))
        .chain(outcome.evictions.iter().map(|eviction| eviction.handle))
        .chain(outcome.rejected.iter().map(|rejected| rejected.handle));

    let mut seen = HashSet::new();
    let mut count = 0;
    for handle in handles {
        assert!(seen.insert(handle), "Handle {handle} returned twice");
        count += 1;
    }

    assert_eq!(count, total, "Some handles were never returned");
    assert!((0..total).all(|handle| seen.contains(&handle)));
}

/// Create a standard config for testing.
#[allow(dead_code)]
pub fn default_config() -> Config {
    Config::new(Duration::from_millis(100), 16)
}

/// Create a config with custom window size.
#[allow(dead_code)]
pub fn config_with_window(window_ms: u64) -> Config {
    Config::new(Duration::from_millis(window_ms), 16)
}

/// Create a config with custom buffer size.
#[allow(dead_code)]
pub fn config_with_buffer_size(buf_size: usize) -> Config {
    Config::new(Duration::from_millis(100), buf_size)
}
