//! Linux evdev activity source.
//!
//! Scans a directory of `event*` character devices, asks each for its capability
//! bitmaps, and keeps the ones accepted by a [`DeviceMatcher`]. Every event read from a
//! kept device is reported as one activity signal.

use std::{
    ffi::{CStr, CString},
    fs::{self, File},
    io::Read,
    os::unix::{ffi::OsStrExt, fs::OpenOptionsExt, io::AsRawFd},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{io::unix::AsyncFd, task::JoinHandle};

use super::{
    constants::{DEFAULT_INPUT_DIR, EVENTS_PER_READ, EV_KEY, EV_MAX, KEY_MAX},
    matcher::{bitmap_len, DeviceCapabilities, DeviceMatcher, DEFAULT_MATCHERS},
    ActivitySource,
};
use crate::{
    debouncer::ActivitySink,
    error::{Error, Result},
};

/// Size of one `struct input_event`
pub const EVENT_SIZE: usize = std::mem::size_of::<libc::input_event>();

const IOC_READ: libc::c_ulong = 2;
const NAME_LEN: usize = 256;

const fn ioc_read(nr: libc::c_ulong, len: usize) -> libc::c_ulong {
    (IOC_READ << 30) | ((len as libc::c_ulong) << 16) | ((b'E' as libc::c_ulong) << 8) | nr
}

const fn eviocgbit(event_type: u16, len: usize) -> libc::c_ulong {
    ioc_read(0x20 + event_type as libc::c_ulong, len)
}

const fn eviocgname(len: usize) -> libc::c_ulong {
    ioc_read(0x06, len)
}

/// Input device accepted by a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub path: PathBuf,
    pub name: String,
    pub kind: &'static str,
}

/// `event*` nodes in `dir`, sorted by path
pub fn scan_event_nodes(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut nodes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().as_bytes().starts_with(b"event") {
            nodes.push(entry.path());
        }
    }
    nodes.sort();
    Ok(nodes)
}

/// Reads the device name and capability bitmaps of one evdev node
pub fn probe_device(path: &Path) -> Result<(String, DeviceCapabilities)> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::system(format!("invalid device path {}", path.display())))?;

    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY | libc::O_NONBLOCK | libc::O_CLOEXEC) };
    if fd < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let fd = scopeguard::guard(fd, |fd| unsafe {
        libc::close(fd);
    });

    let mut events = vec![0u8; bitmap_len(EV_MAX)];
    let mut keys = vec![0u8; bitmap_len(KEY_MAX)];
    unsafe {
        if libc::ioctl(*fd, eviocgbit(0, events.len()) as _, events.as_mut_ptr()) < 0 {
            return Err(Error::system(format!(
                "EVIOCGBIT failed on {}: {}",
                path.display(),
                std::io::Error::last_os_error()
            )));
        }
        // devices without EV_KEY legitimately fail here
        if libc::ioctl(*fd, eviocgbit(EV_KEY, keys.len()) as _, keys.as_mut_ptr()) < 0 {
            keys.fill(0);
        }
    }

    let mut name_buf = [0u8; NAME_LEN];
    let name = unsafe {
        if libc::ioctl(*fd, eviocgname(NAME_LEN) as _, name_buf.as_mut_ptr()) < 0 {
            None
        } else {
            CStr::from_bytes_until_nul(&name_buf).ok().map(|s| s.to_string_lossy().into_owned())
        }
    };

    Ok((name.unwrap_or_else(|| "unknown".to_string()), DeviceCapabilities::from_bitmaps(&events, &keys)))
}

/// Pumps events from a readable fd into `sink` until EOF, an error, or the sink closes
pub(crate) async fn read_events<T>(device: AsyncFd<T>, name: String, sink: ActivitySink)
where
    T: AsRawFd,
    for<'a> &'a T: Read,
{
    let mut buf = vec![0u8; EVENT_SIZE * EVENTS_PER_READ];

    loop {
        let mut guard = match device.readable().await {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(device = %name, "input device poll failed: {}", e);
                break;
            },
        };

        match guard.try_io(|inner| {
            let mut reader = inner.get_ref();
            reader.read(&mut buf)
        }) {
            Ok(Ok(0)) => {
                tracing::info!(device = %name, "input device closed");
                break;
            },
            Ok(Ok(n)) => {
                for _ in 0..(n / EVENT_SIZE).max(1) {
                    sink.on_activity();
                }
                if sink.is_closed() {
                    break;
                }
            },
            Ok(Err(e)) => {
                // ENODEV once the device is unplugged
                tracing::info!(device = %name, "input device disconnected: {}", e);
                break;
            },
            Err(_would_block) => continue,
        }
    }
}

/// Activity source fed by Linux input devices
#[derive(Debug)]
pub struct EvdevSource {
    dir: PathBuf,
    matchers: Vec<DeviceMatcher>,
    devices: Vec<InputDevice>,
    readers: Vec<JoinHandle<()>>,
}

impl Default for EvdevSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EvdevSource {
    /// Touchscreens and mice under `/dev/input`
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_INPUT_DIR)
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), matchers: DEFAULT_MATCHERS.to_vec(), devices: Vec::new(), readers: Vec::new() }
    }

    /// Replaces the device matchers
    pub fn with_matchers(mut self, matchers: Vec<DeviceMatcher>) -> Self {
        self.matchers = matchers;
        self
    }

    /// Devices currently being listened to
    pub fn devices(&self) -> &[InputDevice] {
        &self.devices
    }

    fn matching_devices(&self) -> Result<Vec<InputDevice>> {
        let mut found = Vec::new();
        for path in scan_event_nodes(&self.dir)? {
            let (name, caps) = match probe_device(&path) {
                Ok(probed) => probed,
                Err(e) => {
                    tracing::debug!(device = %path.display(), "skipping input device: {}", e);
                    continue;
                },
            };
            if let Some(matcher) = DeviceMatcher::find(&self.matchers, &caps) {
                found.push(InputDevice { path, name, kind: matcher.name });
            }
        }
        Ok(found)
    }
}

fn open_nonblocking(path: &Path) -> Result<AsyncFd<File>> {
    let file = fs::OpenOptions::new().read(true).custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC).open(path)?;
    Ok(AsyncFd::new(file)?)
}

#[async_trait]
impl ActivitySource for EvdevSource {
    fn name(&self) -> &str {
        "evdev"
    }

    async fn register(&mut self, sink: ActivitySink) -> Result<()> {
        if !self.readers.is_empty() {
            return Ok(());
        }

        let candidates = self
            .matching_devices()
            .map_err(|e| Error::initialization(format!("scanning {}: {e}", self.dir.display())))?;

        for device in candidates {
            let fd = match open_nonblocking(&device.path) {
                Ok(fd) => fd,
                Err(e) => {
                    tracing::warn!(device = %device.path.display(), "cannot open input device: {}", e);
                    continue;
                },
            };
            tracing::info!(device = %device.path.display(), name = %device.name, kind = device.kind, "listening for input");
            self.readers.push(tokio::spawn(read_events(fd, device.name.clone(), sink.clone())));
            self.devices.push(device);
        }

        if self.readers.is_empty() {
            return Err(Error::initialization(format!("no matching input devices under {}", self.dir.display())));
        }
        Ok(())
    }

    async fn unregister(&mut self) -> Result<()> {
        for reader in &self.readers {
            reader.abort();
        }
        for result in futures::future::join_all(self.readers.drain(..)).await {
            if let Err(e) = result {
                if e.is_panic() {
                    tracing::warn!("input reader panicked: {}", e);
                }
            }
        }
        self.devices.clear();
        Ok(())
    }
}
