//! Driver and run loop for a USB LED readerboard sign.
//!
//! The crate is layered leaves-first:
//! - [`transport`]: moves one control request to the device (USB or dry run)
//! - [`protocol`]: request numbers, buffer indices, command encoding
//! - [`board`]: the display controller with double-buffer tracking
//! - [`script`]: directives and the stock message sequence
//! - [`leaderboard`]: score file parsing
//! - [`supervisor`]: the self-healing Connecting/Running loop
//!
//! This module holds what the layers share: device identity, sign
//! geometry, the sleep clock, and shutdown signalling.

pub mod board;
pub mod error;
pub mod leaderboard;
pub mod protocol;
pub mod script;
pub mod supervisor;
pub mod transport;

pub use board::Readerboard;
pub use error::{BoardError, LeaderboardError};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// ── Device identity ────────────────────────────────────────────────

/// USB vendor/product pair that identifies the sign.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::new(0x8080, 0x6464)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

// ── Sign geometry ──────────────────────────────────────────────────

/// Dimensions of the LED matrix, in pixels.
///
/// Rows are sent to the device as packed bits, one bit per column, most
/// significant bit first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignGeometry {
    pub cols: u8,
    pub rows: u8,
}

impl SignGeometry {
    pub fn new(cols: u8, rows: u8) -> Self {
        Self { cols, rows }
    }

    /// Bytes needed for one row of packed pixels.
    pub fn line_bytes(&self) -> usize {
        (self.cols as usize).div_ceil(8)
    }

    /// Whether a row of `len` packed bytes at `row` is something the
    /// firmware will accept.
    pub fn fits_line(&self, row: u8, len: usize) -> bool {
        row < self.rows && len <= self.line_bytes()
    }
}

impl Default for SignGeometry {
    fn default() -> Self {
        Self { cols: 120, rows: 7 }
    }
}

// ── Clock ──────────────────────────────────────────────────────────

/// Source of real-time waits. Injected so tests never actually sleep.
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock sleeps that end early once shutdown is requested.
pub struct SystemClock {
    running: Arc<AtomicBool>,
}

impl SystemClock {
    /// How often a long sleep checks the shutdown flag.
    const SLICE: Duration = Duration::from_millis(50);

    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self { running }
    }
}

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        // No representable deadline means wait for shutdown.
        let deadline = Instant::now().checked_add(duration);
        while is_running(&self.running) {
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    Self::SLICE.min(deadline - now)
                }
                None => Self::SLICE,
            };
            thread::sleep(slice);
        }
    }
}

// ── Shutdown ───────────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets the returned flag to false.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Test helpers ───────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use super::Clock;
    use std::time::Duration;

    /// Records requested sleeps instead of blocking.
    #[derive(Debug, Default)]
    pub struct FakeClock {
        pub sleeps: Vec<Duration>,
    }

    impl Clock for FakeClock {
        fn sleep(&mut self, duration: Duration) {
            self.sleeps.push(duration);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
