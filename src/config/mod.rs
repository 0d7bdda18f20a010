//! # Boost Configuration
//!
//! Two tunables drive every boost cycle: the frequency floor to apply and how long a
//! window lasts after the most recent input event. Both can be changed while the booster
//! is running through [`SharedConfig`]; a new duration takes effect on the next refresh
//! and a new value on the next raise.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use input_boost::config::{BoostConfig, SharedConfig};
//!
//! let config = BoostConfig::from_json_str(r#"{ "boost_value": 1200000 }"#).unwrap();
//! assert_eq!(config.boost_duration, Duration::from_millis(500));
//!
//! let shared = SharedConfig::new(config);
//! shared.set_boost_duration(Duration::from_millis(250)).unwrap();
//! assert_eq!(shared.boost_duration(), Duration::from_millis(250));
//! ```

use std::{fs, path::Path, sync::Arc, time::Duration};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod constants;

pub use constants::{DEFAULT_BOOST_DURATION_MS, DEFAULT_BOOST_FREQ_KHZ, ENV_BOOST_DURATION_MS, ENV_BOOST_FREQ_KHZ};

/// Boost parameters read by the debouncer on every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostConfig {
    /// Frequency floor in kHz
    pub boost_value: u64,

    /// Time the floor stays raised after the last activity signal
    #[serde(rename = "boost_duration_ms", with = "duration_ms")]
    pub boost_duration: Duration,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            boost_value: DEFAULT_BOOST_FREQ_KHZ,
            boost_duration: Duration::from_millis(DEFAULT_BOOST_DURATION_MS),
        }
    }
}

impl BoostConfig {
    /// Creates a validated configuration
    pub fn new(boost_value: u64, boost_duration: Duration) -> Result<Self> {
        let config = Self { boost_value, boost_duration };
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Reads `path` (or starts from the defaults) and applies overrides from `lookup`
    pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_overrides(lookup)
    }

    /// Applies `INPUT_BOOST_FREQ_KHZ` / `INPUT_BOOST_DURATION_MS` from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_BOOST_FREQ_KHZ) {
            self.boost_value = parse_u64(ENV_BOOST_FREQ_KHZ, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BOOST_DURATION_MS) {
            self.boost_duration = Duration::from_millis(parse_u64(ENV_BOOST_DURATION_MS, &raw)?);
        }
        self.validate()?;
        Ok(self)
    }

    /// Rejects a zero floor or a zero-length window
    pub fn validate(&self) -> Result<()> {
        validate_value(self.boost_value)?;
        validate_duration(self.boost_duration)
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| Error::invalid_config(format!("{key}={raw:?}: {e}")))
}

fn validate_value(value: u64) -> Result<()> {
    if value == 0 {
        return Err(Error::invalid_config("boost_value must be greater than zero"));
    }
    Ok(())
}

fn validate_duration(duration: Duration) -> Result<()> {
    if duration.is_zero() {
        return Err(Error::invalid_config("boost_duration must be greater than zero"));
    }
    Ok(())
}

/// Live, thread-safe view of a [`BoostConfig`]
///
/// Reads are cheap and may happen concurrently; writes go through the validated setters.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<BoostConfig>>,
}

impl SharedConfig {
    pub fn new(config: BoostConfig) -> Self {
        Self { inner: Arc::new(RwLock::new(config)) }
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> BoostConfig {
        *self.inner.read()
    }

    pub fn boost_value(&self) -> u64 {
        self.inner.read().boost_value
    }

    pub fn boost_duration(&self) -> Duration {
        self.inner.read().boost_duration
    }

    /// Changes the floor used by the next raise
    pub fn set_boost_value(&self, value: u64) -> Result<()> {
        validate_value(value)?;
        self.inner.write().boost_value = value;
        tracing::info!(boost_value = value, "boost value updated");
        Ok(())
    }

    /// Changes the window used by the next refresh
    pub fn set_boost_duration(&self, duration: Duration) -> Result<()> {
        validate_duration(duration)?;
        self.inner.write().boost_duration = duration;
        tracing::info!(boost_duration_ms = duration.as_millis() as u64, "boost duration updated");
        Ok(())
    }
}

impl SharedConfig {
    /// Swaps in a whole configuration at once
    pub fn replace(&self, config: BoostConfig) -> Result<()> {
        config.validate()?;
        *self.inner.write() = config;
        tracing::info!(
            boost_value = config.boost_value,
            boost_duration_ms = config.boost_duration.as_millis() as u64,
            "boost configuration replaced"
        );
        Ok(())
    }

    /// Re-reads the configuration like the daemon does at startup
    ///
    /// On any error the current values stay in effect.
    pub fn reload_from<F>(&self, path: Option<&Path>, lookup: F) -> Result<BoostConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = BoostConfig::load(path, lookup)?;
        self.replace(config)?;
        Ok(config)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
