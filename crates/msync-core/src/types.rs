use futures::stream::BoxStream;
use tokio::sync::watch;

use crate::group::SyncEvent;

/// The feedback message published by the
/// [Synchronizer](crate::Synchronizer) to control the pace of
/// producers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feedback {
    /// Anchor timestamp of the latest delivered group.
    pub commit_timestamp_ns: Option<i64>,
    /// Streams whose buffer can take another entry.
    pub accepted_streams: Vec<String>,
}

impl Feedback {
    pub fn accepts(&self, stream: &str) -> bool {
        self.accepted_streams.iter().any(|s| s == stream)
    }
}

/// The receiver returned by
/// [Synchronizer::feedback](crate::Synchronizer::feedback).
pub type FeedbackReceiver = watch::Receiver<Feedback>;

/// The stream returned by [sync](crate::sync()).
pub type OutputStream<'a, H> = BoxStream<'a, eyre::Result<SyncEvent<H>>>;
