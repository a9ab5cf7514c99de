use crate::{
    Config,
    error::SyncError,
    group::SyncEvent,
    synchronizer::Synchronizer,
    types::OutputStream,
};
use futures::{
    StreamExt,
    stream::{self, Stream},
};
use std::{
    collections::VecDeque,
    task::{Context, Poll, Poll::*},
};
use tracing::debug;

/// Consume a stream of `(stream, timestamp_ns, handle)` items and
/// group up entries within a time window across the given streams.
///
/// Every accepted item eventually comes back exactly once, either
/// inside a [SyncEvent::Group] or as a [SyncEvent::Evicted] notice.
/// Items the synchronizer refuses come back as [SyncEvent::Rejected].
/// When the input ends, or yields an error, the remaining buffered
/// entries are flushed as evictions.
pub fn sync<'a, K, H, S, I>(
    stream: S,
    streams: I,
    config: Config,
) -> Result<OutputStream<'a, H>, SyncError>
where
    K: AsRef<str>,
    H: Send + 'a,
    S: Stream<Item = eyre::Result<(K, i64, H)>> + Unpin + Send + 'a,
    I: IntoIterator,
    I::Item: Into<String>,
{
    let synchronizer = Synchronizer::with_streams(config, streams)?;

    let output_stream = {
        let mut input = Some(stream);
        let mut pending = VecDeque::new();
        stream::poll_fn(move |ctx| poll(&mut input, &synchronizer, &mut pending, ctx))
    };

    Ok(output_stream.boxed())
}

/// The polling function is repeatedly called to generate events.
fn poll<K, H, S>(
    input: &mut Option<S>,
    synchronizer: &Synchronizer<H>,
    pending: &mut VecDeque<SyncEvent<H>>,
    ctx: &mut Context<'_>,
) -> Poll<Option<eyre::Result<SyncEvent<H>>>>
where
    K: AsRef<str>,
    S: Stream<Item = eyre::Result<(K, i64, H)>> + Unpin,
{
    loop {
        if let Some(event) = pending.pop_front() {
            return Ready(Some(Ok(event)));
        }

        // Case: the input stream is depleted and everything is flushed.
        let Some(input_stream) = input.as_mut() else {
            return Ready(None);
        };

        match input_stream.poll_next_unpin(ctx) {
            Ready(Some(Ok((key, timestamp_ns, handle)))) => {
                if let Err(rejected) = synchronizer.push(key.as_ref(), timestamp_ns, handle) {
                    debug!(error = %rejected.error, "drop a rejected message");
                    pending.push_back(SyncEvent::Rejected(rejected));
                }
                pending.extend(synchronizer.poll().into_events());
            }
            Ready(Some(Err(err))) => {
                *input = None;
                pending.extend(synchronizer.flush().into_iter().map(SyncEvent::Evicted));
                return Ready(Some(Err(err)));
            }
            Ready(None) => {
                *input = None;
                pending.extend(synchronizer.poll().into_events());
                pending.extend(synchronizer.flush().into_iter().map(SyncEvent::Evicted));
            }
            Pending => return Pending,
        }
    }
}
