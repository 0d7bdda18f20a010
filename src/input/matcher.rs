use std::fmt;

use super::constants::{BTN_MOUSE, BTN_TOUCH, EV_ABS, EV_KEY, EV_MAX, EV_REL, KEY_MAX};

/// Number of bytes needed to hold bits `0..=max`
pub(crate) const fn bitmap_len(max: u16) -> usize {
    max as usize / 8 + 1
}

/// Event types and key codes a device reports
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCapabilities {
    events: Vec<u8>,
    keys: Vec<u8>,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self { events: vec![0; bitmap_len(EV_MAX)], keys: vec![0; bitmap_len(KEY_MAX)] }
    }
}

impl fmt::Debug for DeviceCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<u16> = (0..=EV_MAX).filter(|&ev| self.has_event(ev)).collect();
        let keys = (0..=KEY_MAX).filter(|&key| self.has_key(key)).count();
        f.debug_struct("DeviceCapabilities").field("events", &events).field("keys", &keys).finish()
    }
}

fn test_bit(bitmap: &[u8], bit: u16) -> bool {
    bitmap.get(bit as usize / 8).is_some_and(|byte| byte & (1 << (bit % 8)) != 0)
}

fn set_bit(bitmap: &mut [u8], bit: u16) {
    if let Some(byte) = bitmap.get_mut(bit as usize / 8) {
        *byte |= 1 << (bit % 8);
    }
}

impl DeviceCapabilities {
    /// Builds capabilities from the raw `EVIOCGBIT` bitmaps
    pub fn from_bitmaps(events: &[u8], keys: &[u8]) -> Self {
        let mut caps = Self::default();
        let ev_len = caps.events.len().min(events.len());
        caps.events[..ev_len].copy_from_slice(&events[..ev_len]);
        let key_len = caps.keys.len().min(keys.len());
        caps.keys[..key_len].copy_from_slice(&keys[..key_len]);
        caps
    }

    pub fn with_event(mut self, event_type: u16) -> Self {
        set_bit(&mut self.events, event_type);
        self
    }

    /// Adds a key code, which also implies `EV_KEY`
    pub fn with_key(mut self, code: u16) -> Self {
        set_bit(&mut self.events, EV_KEY);
        set_bit(&mut self.keys, code);
        self
    }

    pub fn has_event(&self, event_type: u16) -> bool {
        test_bit(&self.events, event_type)
    }

    pub fn has_key(&self, code: u16) -> bool {
        test_bit(&self.keys, code)
    }
}

/// Capability predicate deciding which devices count as activity
///
/// A device matches when it reports every listed event type and every listed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMatcher {
    pub name: &'static str,
    pub events: &'static [u16],
    pub keys: &'static [u16],
}

/// Touchscreens and mice
pub const DEFAULT_MATCHERS: &[DeviceMatcher] = &[DeviceMatcher::TOUCHSCREEN, DeviceMatcher::MOUSE];

impl DeviceMatcher {
    /// Absolute positioning with a touch button
    pub const TOUCHSCREEN: DeviceMatcher = DeviceMatcher { name: "touchscreen", events: &[EV_ABS], keys: &[BTN_TOUCH] };

    /// Relative motion with a mouse button
    pub const MOUSE: DeviceMatcher = DeviceMatcher { name: "mouse", events: &[EV_REL], keys: &[BTN_MOUSE] };

    pub fn matches(&self, caps: &DeviceCapabilities) -> bool {
        self.events.iter().all(|&ev| caps.has_event(ev)) && self.keys.iter().all(|&key| caps.has_key(key))
    }

    /// First matcher in `matchers` accepting `caps`
    pub fn find<'a>(matchers: &'a [DeviceMatcher], caps: &DeviceCapabilities) -> Option<&'a DeviceMatcher> {
        matchers.iter().find(|m| m.matches(caps))
    }
}
