//! # Booster Lifecycle
//!
//! [`Booster`] ties a floor backend, an activity source, and the boost configuration
//! together and exposes the two lifecycle entry points.
//!
//! - `start()` acquires the constraint handle, spawns the debouncer, and registers with the
//!   activity source. If any step fails, everything acquired so far is released again
//!   before the error is returned.
//! - `stop()` unregisters from the source, stops the debouncer (dropping any pending
//!   unboost deadline), forces the default floor, and releases the handle.
//!
//! Both are idempotent. Activity that arrives while `stop()` runs is ignored.
//!
//! ## Example
//!
//! ```rust,no_run
//! use input_boost::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> input_boost::Result<()> {
//!     let mut booster = Booster::new(SysfsCpuFreq::new(), EvdevSource::new(), BoostConfig::default())?;
//!     booster.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     booster.stop().await
//! }
//! ```

use std::sync::Arc;

use crate::{
    config::{BoostConfig, SharedConfig},
    constraint::{ConstraintController, FloorBackend, FloorValue},
    debouncer::{BoostStats, Debouncer},
    error::{Error, Result},
    input::ActivitySource,
};

/// Event-triggered resource booster
pub struct Booster {
    controller: Arc<ConstraintController>,
    config: SharedConfig,
    source: Box<dyn ActivitySource>,
    debouncer: Option<Debouncer>,
}

impl std::fmt::Debug for Booster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Booster")
            .field("source", &self.source.name())
            .field("config", &self.config.snapshot())
            .field("controller", &self.controller)
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

impl Booster {
    /// Creates a stopped booster
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when `config` has a zero value or duration.
    pub fn new<B, S>(backend: B, source: S, config: BoostConfig) -> Result<Self>
    where
        B: FloorBackend + 'static,
        S: ActivitySource + 'static,
    {
        config.validate()?;
        Ok(Self {
            controller: Arc::new(ConstraintController::new(backend)),
            config: SharedConfig::new(config),
            source: Box::new(source),
            debouncer: None,
        })
    }

    /// Acquires the constraint handle and starts listening for activity
    pub async fn start(&mut self) -> Result<()> {
        if self.debouncer.is_some() {
            return Ok(());
        }

        self.controller.init()?;
        let mut debouncer = Debouncer::spawn(self.controller.clone(), self.config.clone());

        if let Err(e) = self.source.register(debouncer.sink()).await {
            if let Err(stop_err) = debouncer.stop().await {
                tracing::warn!("debouncer did not stop cleanly: {}", stop_err);
            }
            if let Err(release_err) = self.controller.shutdown() {
                tracing::warn!("constraint release failed during unwind: {}", release_err);
            }
            return Err(match e {
                Error::InitializationFailure(msg) => Error::InitializationFailure(msg),
                other => Error::initialization(format!("{} activity source: {other}", self.source.name())),
            });
        }

        let config = self.config.snapshot();
        tracing::info!(
            source = self.source.name(),
            boost_value = config.boost_value,
            boost_duration_ms = config.boost_duration.as_millis() as u64,
            "input booster started"
        );
        self.debouncer = Some(debouncer);
        Ok(())
    }

    /// Stops listening, restores the default floor, and releases the handle
    ///
    /// Every step runs even if an earlier one fails; the first error is returned.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut debouncer) = self.debouncer.take() else {
            return Ok(());
        };

        let unregistered = self.source.unregister().await;
        let stopped = debouncer.stop().await;
        let restored = self.controller.shutdown();
        tracing::info!(stats = ?debouncer.stats(), "input booster stopped");

        unregistered.and(stopped).and(restored)
    }

    /// Live configuration; changes apply from the next raise or refresh
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.debouncer.is_some()
    }

    pub fn is_boosting(&self) -> bool {
        self.debouncer.as_ref().is_some_and(Debouncer::is_boosting)
    }

    /// Counters of the current run, if running
    pub fn stats(&self) -> Option<BoostStats> {
        self.debouncer.as_ref().map(Debouncer::stats)
    }

    /// Floor currently in effect
    pub fn current_floor(&self) -> FloorValue {
        self.controller.current()
    }
}

impl Drop for Booster {
    fn drop(&mut self) {
        // dropping the debouncer aborts its worker
        if self.debouncer.take().is_some() {
            if let Err(e) = self.controller.shutdown() {
                tracing::warn!("failed to restore default floor on drop: {}", e);
            }
        }
    }
}
