mod common;

use common::*;
use msync_core::{Config, Synchronizer};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_high_volume_processing() {
    // Process 30k messages from 3 interleaved streams.
    let message_count = 10_000i64;
    let keys: Vec<String> = (0..3).map(|i| format!("stream_{i}")).collect();

    let mut builder = StreamBuilder::new();
    for i in 0..message_count {
        for (stream_id, key) in keys.iter().enumerate() {
            let timestamp = i * 10 + stream_id as i64 * 2;
            builder = builder.add_message(key.as_str(), timestamp);
        }
    }
    let total = builder.len();

    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let config = Config::new(Duration::from_millis(5), 64);

    let start_time = Instant::now();
    let outcome = run_sync(builder.build(), key_refs.clone(), config)
        .await
        .unwrap();
    let elapsed = start_time.elapsed();

    assert!(
        elapsed.as_millis() < 5000,
        "Processing took too long: {:?}",
        elapsed
    );

    assert_eq!(outcome.groups.len(), message_count as usize);
    assert!(outcome.evictions.is_empty());
    assert!(outcome.rejected.is_empty());

    assert_groups_valid(&outcome.groups, &key_refs, Duration::from_millis(5));
    assert_timestamp_ordering(&outcome.groups);
    assert_all_accounted(&outcome, total);
}

/// Drive a synchronizer with random pushes and polls and check the
/// invariants after every step.
fn run_random_schedule(seed: u64, stream_count: usize, buffer_size: usize, window_ms: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let streams: Vec<String> = (0..stream_count).map(|i| format!("s{i}")).collect();
    let window = Duration::from_millis(window_ms);

    let sync = Synchronizer::with_streams(Config::new(window, buffer_size), &streams).unwrap();

    let mut next_ts = vec![0i64; stream_count];
    let mut outcome = Outcome::default();
    let mut pushed = 0usize;

    for _ in 0..5_000 {
        if rng.random_bool(0.8) {
            let index = rng.random_range(0..stream_count);
            next_ts[index] += rng.random_range(0..40) * MS;

            if let Err(rejected) = sync.push(&streams[index], next_ts[index], pushed) {
                outcome.rejected.push(rejected);
            }
            pushed += 1;
        } else {
            let pending: usize = streams
                .iter()
                .map(|s| sync.buffer_len(s).unwrap())
                .sum();

            let output = sync.poll();

            // Every round removes at least one entry.
            assert!(output.groups.len() * stream_count + output.evictions.len() <= pending);

            let refs: Vec<&str> = streams.iter().map(String::as_str).collect();
            assert_groups_valid(&output.groups, &refs, window);
            assert_timestamp_ordering(&output.groups);

            outcome.groups.extend(output.groups);
            outcome.evictions.extend(output.evictions);
        }

        for stream in &streams {
            assert!(sync.buffer_len(stream).unwrap() <= buffer_size);
        }
    }

    let output = sync.poll();
    outcome.groups.extend(output.groups);
    outcome.evictions.extend(output.evictions);
    outcome.evictions.extend(sync.flush());

    // Per-stream timestamps only grow, so anchors grow across polls too.
    assert_timestamp_ordering(&outcome.groups);
    assert_all_accounted(&outcome, pushed);

    let stats = sync.stats();
    assert_eq!(stats.groups as usize, outcome.groups.len());
    assert_eq!(stats.total_evicted() as usize, outcome.evictions.len());
    assert_eq!(stats.total_rejected() as usize, outcome.rejected.len());
    assert_eq!(stats.total_received() as usize, pushed - outcome.rejected.len());
}

#[test]
fn test_random_schedules_keep_invariants() {
    for seed in 0..8 {
        run_random_schedule(seed, 2, 4, 15);
        run_random_schedule(seed, 3, 8, 30);
        run_random_schedule(seed, 5, 2, 10);
    }
}

#[test]
fn test_identical_input_gives_identical_groups() {
    fn run() -> Vec<Vec<(String, i64)>> {
        let config = Config::new(Duration::from_millis(10), 8);
        let sync = Synchronizer::with_streams(config, ["a", "b", "c"]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut groups = Vec::new();

        for i in 0..200i64 {
            for stream in ["a", "b", "c"] {
                // Many exact ties between streams.
                let ts = i * 10 * MS + rng.random_range(0..3) * 5 * MS;
                let _ = sync.push(stream, ts, ());
            }
            for group in sync.poll().groups {
                groups.push(
                    group
                        .entries
                        .iter()
                        .map(|(stream, entry)| (stream.clone(), entry.timestamp_ns))
                        .collect(),
                );
            }
        }
        groups
    }

    assert_eq!(run(), run());
}
