use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::constraint::{FloorBackend, MockFloorBackend};
use crate::error::Result;

/// Backend operation seen by [`RecordingBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorOp {
    Acquire,
    Set(u64),
    Clear,
    Release,
}

/// Backend that logs every call with the (tokio) time it happened
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    log: Arc<Mutex<Vec<(FloorOp, Instant)>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<FloorOp> {
        self.log.lock().iter().map(|(op, _)| *op).collect()
    }

    pub fn timeline(&self) -> Vec<(FloorOp, Instant)> {
        self.log.lock().clone()
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

/// Mock backend that accepts any call
pub fn create_mock_backend() -> MockFloorBackend {
    let mut mock = MockFloorBackend::new();
    mock.expect_acquire().returning(|| Ok(()));
    mock.expect_set_floor().returning(|_| Ok(()));
    mock.expect_clear_floor().returning(|| Ok(()));
    mock.expect_release().returning(|| Ok(()));
    mock
}

/// Formatted log output captured for the current thread
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    /// Routes every event on this thread into the returned buffer until the guard drops
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let buf = logs.buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || CapturedWriter(buf.clone()))
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    /// Number of lines logged at `level` ("WARN", "INFO", ...)
    pub fn count(&self, level: &str) -> usize {
        let text = String::from_utf8_lossy(&self.buf.lock()).into_owned();
        let needle = format!(" {level} ");
        text.lines().filter(|line| line.contains(&needle)).count()
    }
}
