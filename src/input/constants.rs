//! Event type and code numbers from `linux/input-event-codes.h`.

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;
pub const EV_ABS: u16 = 0x03;
pub const EV_MAX: u16 = 0x1f;

pub const BTN_MOUSE: u16 = 0x110;
pub const BTN_TOUCH: u16 = 0x14a;
pub const KEY_MAX: u16 = 0x2ff;

/// Directory scanned for `event*` nodes by default
pub const DEFAULT_INPUT_DIR: &str = "/dev/input";

/// Upper bound on events pulled from a device per read
pub const EVENTS_PER_READ: usize = 64;
