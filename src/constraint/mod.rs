//! # Constraint Controller
//!
//! The controller owns the single resource-floor handle of a booster and exposes two
//! operations on it: [`ConstraintController::raise`] and
//! [`ConstraintController::restore_default`]. The platform side is abstracted behind
//! [`FloorBackend`]; [`SysfsCpuFreq`] implements it on top of the Linux cpufreq
//! `scaling_min_freq` attributes.
//!
//! ## Lifecycle
//!
//! - [`ConstraintController::init`] acquires the backend handle. Calling it again while the
//!   handle is held is a no-op.
//! - [`ConstraintController::shutdown`] forces the default floor back and releases the
//!   handle. Calling it on a controller that was never initialized is a no-op.
//!
//! Raising or restoring without a held handle fails with
//! [`Error::ConstraintUnavailable`]. That condition is a contract violation by the caller,
//! so it is logged once per controller rather than on every call.
//!
//! ## Example
//!
//! ```rust,no_run
//! use input_boost::constraint::{ConstraintController, FloorValue, SysfsCpuFreq};
//!
//! fn main() -> input_boost::Result<()> {
//!     let controller = ConstraintController::new(SysfsCpuFreq::new());
//!     controller.init()?;
//!     controller.raise(1_026_000)?;
//!     assert_eq!(controller.current(), FloorValue::Value(1_026_000));
//!     controller.restore_default()?;
//!     controller.shutdown()
//! }
//! ```

use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;

use crate::error::{Error, Result};

pub mod sysfs;

pub use sysfs::SysfsCpuFreq;

/// Platform primitive for setting and clearing a resource floor
#[cfg_attr(test, automock)]
pub trait FloorBackend: Send {
    /// Acquire whatever the backend needs before floors can be set
    fn acquire(&mut self) -> Result<()>;

    /// Enforce `value` as the minimum
    fn set_floor(&mut self, value: u64) -> Result<()>;

    /// Remove the floor, returning the resource to its default
    fn clear_floor(&mut self) -> Result<()>;

    /// Give the handle back
    fn release(&mut self) -> Result<()>;
}

/// Floor currently in effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloorValue {
    /// No constraint
    #[default]
    Default,
    /// Minimum enforced at this value
    Value(u64),
}

impl fmt::Display for FloorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloorValue::Default => write!(f, "default"),
            FloorValue::Value(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Uninitialized,
    Active,
    Released,
}

struct Inner {
    backend: Box<dyn FloorBackend>,
    handle: HandleState,
    current: FloorValue,
}

/// Exclusive owner of one resource-floor handle
pub struct ConstraintController {
    inner: Mutex<Inner>,
    unavailable_reported: AtomicBool,
}

impl fmt::Debug for ConstraintController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ConstraintController")
            .field("handle", &inner.handle)
            .field("current", &inner.current)
            .finish()
    }
}

impl ConstraintController {
    pub fn new<B: FloorBackend + 'static>(backend: B) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn FloorBackend>) -> Self {
        Self {
            inner: Mutex::new(Inner { backend, handle: HandleState::Uninitialized, current: FloorValue::Default }),
            unavailable_reported: AtomicBool::new(false),
        }
    }

    /// Acquires the backend handle
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] when the backend refuses the handle.
    pub fn init(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.handle == HandleState::Active {
            return Ok(());
        }
        inner
            .backend
            .acquire()
            .map_err(|e| Error::initialization(format!("resource floor backend: {e}")))?;
        inner.handle = HandleState::Active;
        inner.current = FloorValue::Default;
        self.unavailable_reported.store(false, Ordering::Relaxed);
        tracing::debug!("constraint handle acquired");
        Ok(())
    }

    /// Sets the floor to `value`
    pub fn raise(&self, value: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.handle != HandleState::Active {
            return Err(self.unavailable());
        }
        if inner.current == FloorValue::Value(value) {
            return Ok(());
        }
        inner.backend.set_floor(value)?;
        inner.current = FloorValue::Value(value);
        Ok(())
    }

    /// Resets the floor to the default; a no-op when nothing is raised
    pub fn restore_default(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.handle != HandleState::Active {
            return Err(self.unavailable());
        }
        if inner.current == FloorValue::Default {
            return Ok(());
        }
        inner.backend.clear_floor()?;
        inner.current = FloorValue::Default;
        Ok(())
    }

    /// Forces the default floor and releases the handle
    ///
    /// The handle is considered released even when the backend reports an error; the first
    /// such error is returned.
    pub fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.handle != HandleState::Active {
            return Ok(());
        }

        let cleared = if inner.current == FloorValue::Default {
            Ok(())
        } else {
            inner.backend.clear_floor()
        };
        inner.current = FloorValue::Default;
        let released = inner.backend.release();
        inner.handle = HandleState::Released;
        tracing::debug!("constraint handle released");

        cleared.and(released)
    }

    /// Floor currently in effect
    pub fn current(&self) -> FloorValue {
        self.inner.lock().current
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().handle == HandleState::Active
    }

    fn unavailable(&self) -> Error {
        if !self.unavailable_reported.swap(true, Ordering::Relaxed) {
            tracing::warn!("resource constraint used without an acquired handle");
        }
        Error::ConstraintUnavailable
    }
}

#[cfg(test)]
mod tests;
