use crate::{
    buffer::StreamBuffer,
    group::{Entry, Eviction, Group, PollOutput},
};
use indexmap::IndexMap;
use itertools::{Itertools, MinMaxResult};
use tracing::{debug, trace};

/// The result of a single matching round.
#[derive(Debug)]
pub enum Round<H> {
    /// Some stream has no pending entry.
    NotReady,
    /// The front entries fit in the window and were grouped.
    Matched(Group<H>),
    /// The front entries do not fit in the window. The oldest one was
    /// discarded.
    Evicted(Eviction<H>),
}

/// Pivot-based multi-way matcher over one buffer per stream.
///
/// Each round looks at the front entry of every buffer. If they all
/// fit in the window they form a group. Otherwise the oldest front
/// entry can never join a future group and is evicted.
#[derive(Debug)]
pub struct MatchEngine<H> {
    /// Buffers indexed by stream, in registration order.
    buffers: IndexMap<String, StreamBuffer<H>>,

    /// The maximum span of a group in nanoseconds.
    window_size_ns: u64,
}

impl<H> MatchEngine<H> {
    pub fn new<I>(streams: I, window_size_ns: u64, buffer_size: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let buffers = streams
            .into_iter()
            .map(|stream| (stream, StreamBuffer::with_capacity(buffer_size)))
            .collect();

        Self {
            buffers,
            window_size_ns,
        }
    }

    pub fn window_size_ns(&self) -> u64 {
        self.window_size_ns
    }

    pub fn buffers(&self) -> &IndexMap<String, StreamBuffer<H>> {
        &self.buffers
    }

    pub fn buffer(&self, stream: &str) -> Option<&StreamBuffer<H>> {
        self.buffers.get(stream)
    }

    pub fn buffer_mut(&mut self, stream: &str) -> Option<&mut StreamBuffer<H>> {
        self.buffers.get_mut(stream)
    }

    pub fn stream_count(&self) -> usize {
        self.buffers.len()
    }

    /// Total number of buffered entries across all streams.
    pub fn pending(&self) -> usize {
        self.buffers.values().map(StreamBuffer::len).sum()
    }

    /// Checks if every buffer holds at least one entry.
    pub fn is_ready(&self) -> bool {
        !self.buffers.is_empty() && self.buffers.values().all(|buffer| !buffer.is_empty())
    }

    /// Run one round of the matching algorithm.
    pub fn step(&mut self) -> Round<H> {
        if !self.is_ready() {
            return Round::NotReady;
        }

        // Ties on the minimum resolve to the first stream in
        // registration order.
        let fronts = self
            .buffers
            .values()
            .enumerate()
            .filter_map(|(index, buffer)| Some((index, buffer.front()?.timestamp_ns)));
        let (min_index, min_ts, max_ts) = match fronts.minmax_by_key(|&(_, ts)| ts) {
            MinMaxResult::NoElements => return Round::NotReady,
            MinMaxResult::OneElement((index, ts)) => (index, ts, ts),
            MinMaxResult::MinMax((index, min_ts), (_, max_ts)) => (index, min_ts, max_ts),
        };

        if max_ts.abs_diff(min_ts) <= self.window_size_ns {
            let entries: IndexMap<String, Entry<H>> = self
                .buffers
                .iter_mut()
                .filter_map(|(stream, buffer)| Some((stream.clone(), buffer.pop_front()?)))
                .collect();

            trace!(
                anchor_timestamp_ns = max_ts,
                span_ns = max_ts.abs_diff(min_ts),
                "matched group"
            );

            return Round::Matched(Group {
                anchor_timestamp_ns: max_ts,
                entries,
            });
        }

        match self.evict_at(min_index) {
            Some(eviction) => {
                debug!(
                    stream = %eviction.stream,
                    timestamp_ns = eviction.timestamp_ns,
                    newest_front_ns = max_ts,
                    "evict entry outside the window"
                );
                Round::Evicted(eviction)
            }
            None => Round::NotReady,
        }
    }

    /// Run rounds until some buffer runs empty, collecting every group
    /// and eviction on the way.
    ///
    /// Each round removes at least one entry, so the number of rounds
    /// is bounded by [pending](Self::pending) at call time.
    pub fn run(&mut self) -> PollOutput<H> {
        let mut output = PollOutput::default();

        loop {
            match self.step() {
                Round::NotReady => break,
                Round::Matched(group) => output.groups.push(group),
                Round::Evicted(eviction) => output.evictions.push(eviction),
            }
        }

        output
    }

    /// Evict every buffered entry in timestamp order across streams.
    pub fn drain(&mut self) -> Vec<Eviction<H>> {
        let mut evictions = Vec::with_capacity(self.pending());

        loop {
            let oldest = self
                .buffers
                .values()
                .enumerate()
                .filter_map(|(index, buffer)| Some((index, buffer.front()?.timestamp_ns)))
                .min_by_key(|&(_, ts)| ts);

            let Some(eviction) = oldest.and_then(|(index, _)| self.evict_at(index)) else {
                break;
            };
            evictions.push(eviction);
        }

        evictions
    }

    fn evict_at(&mut self, index: usize) -> Option<Eviction<H>> {
        let (stream, buffer) = self.buffers.get_index_mut(index)?;
        let Entry {
            timestamp_ns,
            handle,
        } = buffer.pop_front()?;

        Some(Eviction {
            stream: stream.clone(),
            timestamp_ns,
            handle,
        })
    }
}
