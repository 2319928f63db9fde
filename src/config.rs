//! config.rs
//!
//! Timing and buffer parameters of a meter session.

use std::time::Duration;
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// Delay between writing a query and reading its response. The consoles
/// are half-duplex and need a moment to prepare the reply.
pub const SETTLE_DELAY : Duration = Duration::from_millis(10);

/// Maximum number of bytes taken from the channel in one read.
pub const READ_CAPACITY : usize = 1024;

const OPEN_TIMEOUT : Duration = Duration::from_secs(2);
const IO_TIMEOUT : Duration = Duration::from_secs(2);
const BAUDRATE : u32 = 115_200;

/// Parameters of a `ThorlabsPm` session and the channel it opens.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use thorlabs_pm::SessionConfig;
/// let config = SessionConfig::default()
///     .with_settle_delay(Duration::from_millis(25))
///     .with_clear_before_query(false);
/// assert_eq!(config.read_capacity, 1024);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub settle_delay : Duration,
    pub read_capacity : usize,
    /// Send `*CLS` before each query
    pub clear_before_query : bool,
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub open_timeout : Duration,
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub io_timeout : Duration,
    /// Only used by serial channels
    pub baud_rate : u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            settle_delay : SETTLE_DELAY,
            read_capacity : READ_CAPACITY,
            clear_before_query : true,
            open_timeout : OPEN_TIMEOUT,
            io_timeout : IO_TIMEOUT,
            baud_rate : BAUDRATE,
        }
    }
}

impl SessionConfig {
    pub fn with_settle_delay(mut self, delay : Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_read_capacity(mut self, capacity : usize) -> Self {
        self.read_capacity = capacity;
        self
    }

    pub fn with_clear_before_query(mut self, clear : bool) -> Self {
        self.clear_before_query = clear;
        self
    }

    pub fn with_open_timeout(mut self, timeout : Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout : Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_baud_rate(mut self, baud_rate : u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}
