//! # Activity Sources
//!
//! An activity source decides which input counts as activity and reports it to a
//! debouncer through an [`ActivitySink`]. The core never looks at event payloads.
//!
//! - [`EvdevSource`] listens to Linux input devices accepted by a [`DeviceMatcher`]
//!   (touchscreens and mice by default).
//! - [`ChannelSource`] forwards signals sent through an in-process channel, for embedding
//!   the booster in a program that already has its own input loop.

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    debouncer::ActivitySink,
    error::{Error, Result},
};

pub mod constants;
#[cfg(target_os = "linux")]
pub mod evdev;
pub mod matcher;

#[cfg(target_os = "linux")]
pub use evdev::{EvdevSource, InputDevice};
pub use matcher::{DeviceCapabilities, DeviceMatcher, DEFAULT_MATCHERS};

/// Producer of activity signals
#[async_trait]
pub trait ActivitySource: Send {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// Starts delivering signals to `sink`
    ///
    /// Failing here aborts start-up, so a source should fail only when it cannot deliver
    /// anything at all.
    async fn register(&mut self, sink: ActivitySink) -> Result<()>;

    /// Stops delivering signals; safe to call when not registered
    async fn unregister(&mut self) -> Result<()>;
}

/// Sending half of a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct ActivityTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl ActivityTrigger {
    /// Queues one activity signal; returns false once the source is gone
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

type Forwarder = (oneshot::Sender<()>, JoinHandle<mpsc::UnboundedReceiver<()>>);

/// Activity source driven through an [`ActivityTrigger`]
///
/// Signals sent while the source is not registered are discarded on the next
/// registration, so stale input never starts a boost.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Option<mpsc::UnboundedReceiver<()>>,
    forwarder: Option<Forwarder>,
}

impl ChannelSource {
    pub fn new() -> (Self, ActivityTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx: Some(rx), forwarder: None }, ActivityTrigger { tx })
    }

    pub fn is_registered(&self) -> bool {
        self.forwarder.is_some()
    }
}

async fn forward(
    mut rx: mpsc::UnboundedReceiver<()>,
    mut stop_rx: oneshot::Receiver<()>,
    sink: ActivitySink,
) -> mpsc::UnboundedReceiver<()> {
    loop {
        tokio::select! {
            biased;

            _ = &mut stop_rx => break,
            signal = rx.recv() => match signal {
                Some(()) => sink.on_activity(),
                None => break,
            },
        }
    }
    rx
}

#[async_trait]
impl ActivitySource for ChannelSource {
    fn name(&self) -> &str {
        "channel"
    }

    async fn register(&mut self, sink: ActivitySink) -> Result<()> {
        if self.forwarder.is_some() {
            return Ok(());
        }
        let Some(mut rx) = self.rx.take() else {
            return Err(Error::initialization("channel source receiver lost"));
        };
        while rx.try_recv().is_ok() {}

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(forward(rx, stop_rx, sink));
        self.forwarder = Some((stop_tx, handle));
        Ok(())
    }

    async fn unregister(&mut self) -> Result<()> {
        if let Some((stop_tx, handle)) = self.forwarder.take() {
            let _ = stop_tx.send(());
            let rx = handle
                .await
                .map_err(|e| Error::system(format!("channel forwarder failed: {e}")))?;
            self.rx = Some(rx);
        }
        Ok(())
    }
}
