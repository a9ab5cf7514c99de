use crate::error::SyncError;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Configuration parameters passed to [Synchronizer](crate::Synchronizer).
///
/// ```yaml
/// window_size: 50ms
/// buffer_size: 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The time span that the grouped entries must fit within.
    #[serde(with = "humantime_serde", default = "default_window_size")]
    pub window_size: Duration,
    /// The maximum number of entries kept for each stream.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_window_size() -> Duration {
    Duration::from_millis(50)
}

fn default_buffer_size() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Config {
    pub fn new(window_size: Duration, buffer_size: usize) -> Self {
        Self {
            window_size,
            buffer_size,
        }
    }

    /// Create a config from a window size in nanoseconds.
    pub fn from_nanos(window_size_ns: u64, buffer_size: usize) -> Self {
        Self::new(Duration::from_nanos(window_size_ns), buffer_size)
    }

    /// The window size in nanoseconds, saturated to `i64::MAX`.
    pub fn window_size_ns(&self) -> i64 {
        i64::try_from(self.window_size.as_nanos()).unwrap_or(i64::MAX)
    }

    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml_str(&contents)
            .wrap_err_with(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text).wrap_err("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the window and the buffer capacity are positive.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.window_size.is_zero() {
            return Err(SyncError::invalid_config(
                "window_size must be greater than zero",
            ));
        }

        if i64::try_from(self.window_size.as_nanos()).is_err() {
            return Err(SyncError::invalid_config(
                "window_size does not fit in 64-bit nanoseconds",
            ));
        }

        if self.buffer_size == 0 {
            return Err(SyncError::invalid_config(
                "buffer_size must be greater than zero",
            ));
        }

        Ok(())
    }
}
