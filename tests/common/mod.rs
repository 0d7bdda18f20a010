#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use input_boost::{constraint::FloorBackend, debouncer::ActivitySink, input::ActivitySource, Error, Result};
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorOp {
    Acquire,
    Set(u64),
    Clear,
    Release,
}

/// Floor backend recording every call and when it happened
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    log: Arc<Mutex<Vec<(FloorOp, Instant)>>>,
}

impl RecordingBackend {
    pub fn ops(&self) -> Vec<FloorOp> {
        self.log.lock().iter().map(|(op, _)| *op).collect()
    }

    pub fn times_of(&self, wanted: FloorOp) -> Vec<Instant> {
        self.log.lock().iter().filter(|(op, _)| *op == wanted).map(|(_, at)| *at).collect()
    }

    fn record(&self, op: FloorOp) -> Result<()> {
        self.log.lock().push((op, Instant::now()));
        Ok(())
    }
}

impl FloorBackend for RecordingBackend {
    fn acquire(&mut self) -> Result<()> {
        self.record(FloorOp::Acquire)
    }

    fn set_floor(&mut self, value: u64) -> Result<()> {
        self.record(FloorOp::Set(value))
    }

    fn clear_floor(&mut self) -> Result<()> {
        self.record(FloorOp::Clear)
    }

    fn release(&mut self) -> Result<()> {
        self.record(FloorOp::Release)
    }
}

/// Activity source whose registration always fails
#[derive(Debug, Default)]
pub struct FailingSource {
    pub unregistered: bool,
}

#[async_trait]
impl ActivitySource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn register(&mut self, _sink: ActivitySink) -> Result<()> {
        Err(Error::System("device busy".to_string()))
    }

    async fn unregister(&mut self) -> Result<()> {
        self.unregistered = true;
        Ok(())
    }
}

/// Asserts `actual` lands within a couple of milliseconds after `expected`
pub fn assert_at(actual: Instant, expected: Instant) {
    let tolerance = std::time::Duration::from_millis(2);
    assert!(actual >= expected && actual <= expected + tolerance, "expected {:?}, got {:?}", expected, actual);
}
