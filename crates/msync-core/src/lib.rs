//! This library groups up timestamped entries pushed on several named
//! streams into sets whose timestamps lie within a time window.
//!
//! Producers push `(stream, timestamp_ns, handle)` tuples. Handles
//! are opaque: the synchronizer moves them between its buffers and
//! the groups or eviction notices it hands back, and never looks at
//! the payload behind them.
//!
//! # Usage
//!
//! ```rust
//! use msync_core::{Config, Synchronizer};
//! use std::time::Duration;
//!
//! # fn main() -> eyre::Result<()> {
//! let config = Config::new(Duration::from_millis(50), 16);
//! let sync = Synchronizer::with_streams(config, ["cam", "lidar"])?;
//!
//! // Handles can be any owned value, e.g. indices into caller storage.
//! sync.push("cam", 0, 1_usize)?;
//! sync.push("lidar", 10_000_000, 2_usize)?;
//! sync.push("cam", 33_000_000, 3_usize)?;
//! sync.push("lidar", 150_000_000, 4_usize)?;
//!
//! let output = sync.poll();
//! assert_eq!(output.groups.len(), 1);
//! assert_eq!(output.groups[0].anchor_timestamp_ns, 10_000_000);
//!
//! // cam@33ms cannot pair with lidar@150ms and is evicted.
//! assert_eq!(output.evictions.len(), 1);
//! assert_eq!(output.evictions[0].handle, 3);
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod buffer;
mod config;
pub mod engine;
mod error;
mod group;
mod stats;
mod sync;
mod synchronizer;
mod types;

pub use arena::{Handle, PayloadArena};
pub use config::Config;
pub use error::{Rejected, SyncError};
pub use group::{Entry, Eviction, Group, PollOutput, SyncEvent};
pub use stats::{StreamStats, SyncStats};
pub use sync::sync;
pub use synchronizer::Synchronizer;
pub use types::*;
