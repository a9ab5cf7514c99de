use crate::{
    Config,
    engine::MatchEngine,
    error::{Rejected, SyncError},
    group::{Eviction, Group, PollOutput},
    stats::{StreamStats, SyncStats},
    types::{Feedback, FeedbackReceiver},
};
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, warn};

type GroupCallback<H> = Box<dyn FnMut(Group<H>) + Send>;
type EvictionCallback<H> = Box<dyn FnMut(Eviction<H>) + Send>;

/// Groups up entries pushed on several named streams.
///
/// Streams are registered first. The first call to
/// [finalize](Self::finalize), [push](Self::push) or
/// [on_synchronized](Self::on_synchronized) fixes the stream set and
/// allocates one buffer per stream. Producers then push entries, and a
/// consumer calls [poll](Self::poll) (or [spin_once](Self::spin_once)
/// with callbacks) to collect groups.
///
/// All state sits behind a single lock, so the synchronizer can be
/// shared between producer threads through an `Arc`.
///
/// Handles are never inspected. Each pushed handle comes back exactly
/// once: in a [Group], in an [Eviction], or in a [Rejected] error.
///
/// Timestamps pushed on one stream must be non-decreasing. The
/// synchronizer does not reorder entries; violations are counted in
/// [StreamStats::out_of_order].
pub struct Synchronizer<H> {
    config: Config,
    state: Mutex<State<H>>,
    callbacks: Mutex<Callbacks<H>>,
    feedback_tx: watch::Sender<Feedback>,
}

struct State<H> {
    /// Registered streams in registration order.
    streams: Vec<String>,

    /// Created on finalization.
    engine: Option<MatchEngine<H>>,

    stats: SyncStats,

    /// Anchor of the latest delivered group.
    commit_ts: Option<i64>,
}

struct Callbacks<H> {
    on_synchronized: Option<GroupCallback<H>>,
    on_evicted: Option<EvictionCallback<H>>,
}

impl<H> Synchronizer<H> {
    /// Create an unfinalized synchronizer without streams.
    pub fn new(config: Config) -> Result<Self, SyncError> {
        config.validate()?;

        let (feedback_tx, _) = watch::channel(Feedback::default());

        Ok(Self {
            config,
            state: Mutex::new(State {
                streams: Vec::new(),
                engine: None,
                stats: SyncStats::default(),
                commit_ts: None,
            }),
            callbacks: Mutex::new(Callbacks {
                on_synchronized: None,
                on_evicted: None,
            }),
            feedback_tx,
        })
    }

    /// Create a synchronizer, register the streams and finalize it.
    pub fn with_streams<I>(config: Config, streams: I) -> Result<Self, SyncError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let synchronizer = Self::new(config)?;
        for stream in streams {
            synchronizer.register_stream(stream)?;
        }
        synchronizer.finalize()?;
        Ok(synchronizer)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a stream. Only allowed before finalization.
    pub fn register_stream(&self, stream: impl Into<String>) -> Result<(), SyncError> {
        let stream = stream.into();
        let mut state = self.state.lock();

        if state.engine.is_some() {
            return Err(SyncError::AlreadyFinalized);
        }
        if state.streams.contains(&stream) {
            return Err(SyncError::DuplicateStream { stream });
        }

        debug!(stream = %stream, "register stream");
        state.stats.streams.insert(stream.clone(), StreamStats::default());
        state.streams.push(stream);
        Ok(())
    }

    /// Fix the stream set and allocate the buffers.
    ///
    /// A second call fails with [SyncError::AlreadyFinalized] and has
    /// no effect.
    pub fn finalize(&self) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        self.finalize_locked(&mut state)
    }

    pub fn is_finalized(&self) -> bool {
        self.state.lock().engine.is_some()
    }

    /// Push an entry on a stream, finalizing the synchronizer first if
    /// needed.
    ///
    /// On failure nothing is changed and the handle is returned inside
    /// the [Rejected] error.
    pub fn push(&self, stream: &str, timestamp_ns: i64, handle: H) -> Result<(), Rejected<H>> {
        let mut state = self.state.lock();

        let reject = |error: SyncError, handle: H| Rejected {
            error,
            timestamp_ns,
            handle,
        };

        if !state.streams.iter().any(|s| s == stream) {
            return Err(reject(SyncError::unknown_stream(stream), handle));
        }

        if state.engine.is_none()
            && let Err(error) = self.finalize_locked(&mut state)
        {
            return Err(reject(error, handle));
        }

        let State { engine, stats, .. } = &mut *state;
        let (Some(buffer), Some(stream_stats)) = (
            engine.as_mut().and_then(|engine| engine.buffer_mut(stream)),
            stats.streams.get_mut(stream),
        ) else {
            return Err(reject(SyncError::unknown_stream(stream), handle));
        };

        match buffer.try_push(timestamp_ns, handle) {
            Ok(()) => {
                stream_stats.received += 1;

                let out_of_order = buffer.out_of_order_count();
                if out_of_order > stream_stats.out_of_order {
                    warn!(
                        stream = %stream,
                        timestamp_ns,
                        "push is older than the previous entry on the stream"
                    );
                    stream_stats.out_of_order = out_of_order;
                }
            }
            Err(handle) => {
                stream_stats.rejected += 1;
                let capacity = buffer.capacity();
                warn!(stream = %stream, timestamp_ns, capacity, "buffer full, reject entry");

                return Err(reject(
                    SyncError::BufferFull {
                        stream: stream.to_string(),
                        capacity,
                    },
                    handle,
                ));
            }
        }

        self.publish_feedback(&state);
        Ok(())
    }

    /// Match buffered entries until no more progress is possible.
    ///
    /// Returns every group formed, in non-decreasing anchor order, and
    /// every entry evicted on the way. Returns nothing before
    /// finalization.
    pub fn poll(&self) -> PollOutput<H> {
        let mut state = self.state.lock();
        let State {
            engine,
            stats,
            commit_ts,
            ..
        } = &mut *state;

        let Some(engine) = engine.as_mut() else {
            return PollOutput::default();
        };
        let output = engine.run();

        if output.is_empty() {
            return output;
        }

        stats.groups += output.groups.len() as u64;
        for eviction in &output.evictions {
            if let Some(stream_stats) = stats.streams.get_mut(&eviction.stream) {
                stream_stats.evicted += 1;
            }
        }
        if let Some(group) = output.groups.last() {
            *commit_ts = Some(group.anchor_timestamp_ns);
        }

        debug!(
            groups = output.groups.len(),
            evictions = output.evictions.len(),
            pending = engine.pending(),
            "poll"
        );

        self.publish_feedback(&state);
        output
    }

    /// Evict every buffered entry, oldest first.
    pub fn flush(&self) -> Vec<Eviction<H>> {
        let mut state = self.state.lock();
        let State { engine, stats, .. } = &mut *state;

        let Some(engine) = engine.as_mut() else {
            return Vec::new();
        };
        let evictions = engine.drain();

        for eviction in &evictions {
            if let Some(stream_stats) = stats.streams.get_mut(&eviction.stream) {
                stream_stats.evicted += 1;
            }
        }

        if !evictions.is_empty() {
            debug!(evictions = evictions.len(), "flush");
            self.publish_feedback(&state);
        }
        evictions
    }

    /// Register the callback that receives groups in
    /// [spin_once](Self::spin_once). This also finalizes the
    /// synchronizer.
    pub fn on_synchronized<F>(&self, callback: F) -> Result<(), SyncError>
    where
        F: FnMut(Group<H>) + Send + 'static,
    {
        match self.finalize() {
            Ok(()) | Err(SyncError::AlreadyFinalized) => {}
            Err(error) => return Err(error),
        }

        self.callbacks.lock().on_synchronized = Some(Box::new(callback));
        Ok(())
    }

    /// Register the callback that receives evictions in
    /// [spin_once](Self::spin_once).
    pub fn on_evicted<F>(&self, callback: F)
    where
        F: FnMut(Eviction<H>) + Send + 'static,
    {
        self.callbacks.lock().on_evicted = Some(Box::new(callback));
    }

    /// Poll once and hand the results to the registered callbacks.
    ///
    /// Evictions are delivered before groups. Returns the number of
    /// groups delivered. Does nothing until both
    /// [on_synchronized](Self::on_synchronized) and
    /// [on_evicted](Self::on_evicted) are registered, so every handle
    /// that leaves a buffer reaches a callback.
    ///
    /// Callbacks run without any lock held and may call back into the
    /// synchronizer. A nested or concurrent `spin_once` returns 0 while
    /// the callbacks are in use. A callback registered while they run
    /// replaces the running one afterwards.
    pub fn spin_once(&self) -> usize {
        let (mut on_synchronized, mut on_evicted) = {
            let mut callbacks = self.callbacks.lock();
            match (callbacks.on_synchronized.take(), callbacks.on_evicted.take()) {
                (Some(on_synchronized), Some(on_evicted)) => (on_synchronized, on_evicted),
                (on_synchronized, on_evicted) => {
                    callbacks.on_synchronized = on_synchronized;
                    callbacks.on_evicted = on_evicted;
                    return 0;
                }
            }
        };

        let PollOutput { groups, evictions } = self.poll();

        for eviction in evictions {
            on_evicted(eviction);
        }

        let count = groups.len();
        for group in groups {
            on_synchronized(group);
        }

        let mut callbacks = self.callbacks.lock();
        if callbacks.on_synchronized.is_none() {
            callbacks.on_synchronized = Some(on_synchronized);
        }
        if callbacks.on_evicted.is_none() {
            callbacks.on_evicted = Some(on_evicted);
        }
        count
    }

    /// Checks if every buffer holds at least one entry.
    pub fn is_ready(&self) -> bool {
        self.state
            .lock()
            .engine
            .as_ref()
            .is_some_and(|engine| engine.is_ready())
    }

    /// Number of registered streams.
    pub fn stream_count(&self) -> usize {
        self.state.lock().streams.len()
    }

    /// Registered streams in registration order.
    pub fn streams(&self) -> Vec<String> {
        self.state.lock().streams.clone()
    }

    /// Number of buffered entries on a stream, or `None` for an
    /// unknown stream.
    pub fn buffer_len(&self, stream: &str) -> Option<usize> {
        let state = self.state.lock();
        match &state.engine {
            Some(engine) => engine.buffer(stream).map(|buffer| buffer.len()),
            None => state.streams.iter().any(|s| s == stream).then_some(0),
        }
    }

    /// The per-stream buffer capacity.
    pub fn capacity(&self) -> usize {
        self.config.buffer_size
    }

    pub fn stats(&self) -> SyncStats {
        self.state.lock().stats.clone()
    }

    /// Subscribe to back-pressure feedback, updated after each push,
    /// poll and flush.
    pub fn feedback(&self) -> FeedbackReceiver {
        self.feedback_tx.subscribe()
    }

    fn finalize_locked(&self, state: &mut State<H>) -> Result<(), SyncError> {
        if state.engine.is_some() {
            return Err(SyncError::AlreadyFinalized);
        }
        if state.streams.is_empty() {
            return Err(SyncError::NoStreams);
        }

        let window_size_ns = self.config.window_size_ns().unsigned_abs();
        state.engine = Some(MatchEngine::new(
            state.streams.iter().cloned(),
            window_size_ns,
            self.config.buffer_size,
        ));

        debug!(
            streams = state.streams.len(),
            window_size_ns,
            buffer_size = self.config.buffer_size,
            "finalize synchronizer"
        );

        self.publish_feedback(state);
        Ok(())
    }

    fn publish_feedback(&self, state: &State<H>) {
        let Some(engine) = &state.engine else {
            return;
        };

        let feedback = Feedback {
            commit_timestamp_ns: state.commit_ts,
            accepted_streams: engine
                .buffers()
                .iter()
                .filter(|(_, buffer)| !buffer.is_full())
                .map(|(stream, _)| stream.clone())
                .collect(),
        };

        self.feedback_tx.send_if_modified(|current| {
            if *current == feedback {
                false
            } else {
                *current = feedback;
                true
            }
        });
    }
}

impl<H> fmt::Debug for Synchronizer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Synchronizer")
            .field("config", &self.config)
            .field("streams", &state.streams)
            .field("finalized", &state.engine.is_some())
            .finish_non_exhaustive()
    }
}
