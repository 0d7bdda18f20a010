//! Input Boost - raise a CPU frequency floor while the user is interacting
//!
//! This crate listens for input activity (touchscreens and mice by default) and raises a
//! minimum CPU-frequency constraint for a short window after each burst of events. When
//! the window elapses without further input, the constraint is released again.
//!
//! # Features
//!
//! - **Constraint Controller**: exclusive owner of the resource-floor handle, with a
//!   cpufreq `scaling_min_freq` backend for Linux
//! - **Boost Debouncer**: collapses bursts of activity into one boost, refreshing the
//!   window on every new signal
//! - **Activity Sources**: evdev devices matched by capability, or an in-process channel
//! - **Live Configuration**: boost value and duration adjustable while running
//!
//! # Examples
//!
//! ```rust,no_run
//! use input_boost::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (source, trigger) = ChannelSource::new();
//!     let mut booster = Booster::new(SysfsCpuFreq::new(), source, BoostConfig::default())?;
//!     booster.start().await?;
//!
//!     // every trigger keeps the floor raised for another 500 ms
//!     trigger.trigger();
//!
//!     booster.stop().await
//! }
//! ```
//!
//! # Error Handling
//!
//! Start-up failures surface as [`Error::InitializationFailure`] and leave nothing
//! acquired. Once running, failures degrade to "no boost applied" and are logged through
//! `tracing`; they never propagate to whoever reports activity.
//!
//! # Thread Safety
//!
//! [`debouncer::ActivitySink`] is `Send + Sync` and never blocks, so it can be called from
//! any thread, including ones outside the tokio runtime.

pub mod booster;
pub mod config;
pub mod constraint;
pub mod debouncer;
pub mod error;
pub mod input;

#[cfg(test)]
mod test_utils;

pub use error::{Error, Result};

/// Re-export common types for convenience
pub mod prelude {
    pub use crate::booster::Booster;
    pub use crate::config::{BoostConfig, SharedConfig};
    pub use crate::constraint::{ConstraintController, FloorBackend, FloorValue, SysfsCpuFreq};
    pub use crate::debouncer::{ActivitySink, BoostStats, Debouncer};
    #[cfg(target_os = "linux")]
    pub use crate::input::EvdevSource;
    pub use crate::input::{ActivitySource, ActivityTrigger, ChannelSource, DeviceMatcher};
    pub use crate::Error;
    pub use crate::Result;
}
