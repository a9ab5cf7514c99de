use std::fmt;
use thiserror::Error;

/// Errors reported by the [Synchronizer](crate::Synchronizer).
///
/// None of these are fatal. A failed call leaves the synchronizer
/// exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A push referenced a stream that was never registered.
    #[error("unknown stream '{stream}'")]
    UnknownStream { stream: String },

    /// The stream set is fixed once the synchronizer is finalized.
    #[error("synchronizer is already finalized")]
    AlreadyFinalized,

    /// The target stream buffer is at capacity. The new entry is
    /// rejected and existing entries are kept.
    #[error("buffer for stream '{stream}' is full (capacity={capacity})")]
    BufferFull { stream: String, capacity: usize },

    /// The stream was registered twice.
    #[error("stream '{stream}' is already registered")]
    DuplicateStream { stream: String },

    /// Finalization requires at least one registered stream.
    #[error("no streams registered")]
    NoStreams,

    /// The configuration failed validation.
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
}

impl SyncError {
    pub(crate) fn unknown_stream(stream: impl Into<String>) -> Self {
        Self::UnknownStream {
            stream: stream.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// A push that was refused. The handle is handed back to the caller,
/// who remains responsible for its payload.
pub struct Rejected<H> {
    pub error: SyncError,
    pub timestamp_ns: i64,
    pub handle: H,
}

impl<H> Rejected<H> {
    pub fn into_handle(self) -> H {
        self.handle
    }
}

impl<H> fmt::Debug for Rejected<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("timestamp_ns", &self.timestamp_ns)
            .finish_non_exhaustive()
    }
}

impl<H> fmt::Display for Rejected<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push at {}ns rejected: {}", self.timestamp_ns, self.error)
    }
}

impl<H> std::error::Error for Rejected<H> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
