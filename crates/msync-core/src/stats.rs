use indexmap::IndexMap;

/// Counters for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Pushes accepted into the buffer.
    pub received: u64,
    /// Pushes refused because the buffer was full.
    pub rejected: u64,
    /// Entries discarded by the matcher or by a flush.
    pub evicted: u64,
    /// Accepted pushes older than the previous push on the stream.
    pub out_of_order: u64,
}

/// A snapshot of the synchronizer counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Groups delivered so far.
    pub groups: u64,
    /// Per-stream counters in registration order.
    pub streams: IndexMap<String, StreamStats>,
}

impl SyncStats {
    pub fn total_received(&self) -> u64 {
        self.streams.values().map(|stats| stats.received).sum()
    }

    pub fn total_rejected(&self) -> u64 {
        self.streams.values().map(|stats| stats.rejected).sum()
    }

    pub fn total_evicted(&self) -> u64 {
        self.streams.values().map(|stats| stats.evicted).sum()
    }

    /// Fraction of push attempts that were rejected, for one stream or
    /// overall. Returns 0.0 when nothing was pushed.
    pub fn rejection_rate(&self, stream: Option<&str>) -> f64 {
        let (received, rejected) = match stream {
            Some(stream) => match self.streams.get(stream) {
                Some(stats) => (stats.received, stats.rejected),
                None => (0, 0),
            },
            None => (self.total_received(), self.total_rejected()),
        };

        let attempts = received + rejected;
        if attempts == 0 {
            0.0
        } else {
            rejected as f64 / attempts as f64
        }
    }
}
