use futures::{TryStreamExt, stream};
use msync_core::{Config, PayloadArena, SyncEvent, sync};
use std::{sync::Arc, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Frame {
    sensor: &'static str,
    seq: usize,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let camera_ms = [1001, 1034, 1067, 1999, 3000];
    let lidar_ms = [998, 2003, 3002];

    // Payloads live in the arena; only their handles go through the
    // synchronizer.
    let arena = Arc::new(PayloadArena::new());

    macro_rules! make_stream {
        ($sensor:expr, $seq:expr) => {{
            let arena = arena.clone();
            stream::iter($seq.into_iter().enumerate().map(move |(seq, ts): (usize, i64)| {
                let handle = arena.insert(Frame {
                    sensor: $sensor,
                    seq,
                });
                eyre::Ok(($sensor, ts * 1_000_000, handle))
            }))
        }};
    }

    let input = stream::select(
        make_stream!("camera", camera_ms),
        make_stream!("lidar", lidar_ms),
    );

    let config = Config::new(Duration::from_millis(50), 16);
    let events: Vec<_> = sync(input, ["camera", "lidar"], config)?
        .try_collect()
        .await?;

    for event in events {
        match event {
            SyncEvent::Group(group) => {
                let frames: Vec<_> = group
                    .into_handles()
                    .into_values()
                    .filter_map(|handle| arena.take(handle))
                    .map(|frame| format!("{}#{}", frame.sensor, frame.seq))
                    .collect();
                info!(frames = ?frames, "synchronized");
            }
            SyncEvent::Evicted(eviction) => {
                if let Some(frame) = arena.take(eviction.handle) {
                    info!(sensor = frame.sensor, seq = frame.seq, "evicted");
                }
            }
            SyncEvent::Rejected(rejected) => {
                arena.take(rejected.handle);
                info!(error = %rejected.error, "rejected");
            }
        }
    }

    info!(leaked = arena.len(), "done");
    Ok(())
}
