//! Transports: the thing that actually moves a control request to the sign.
//!
//! [`UsbTransport`] talks to real hardware through `rusb` and is only built
//! with the `hardware` feature. [`LoggingTransport`] decodes each request
//! and logs it instead, which is handy for working on scripts without a
//! sign plugged in.

use crate::SignGeometry;
use crate::error::Result;
use crate::protocol::{ControlRequest, DisplayCommand};

/// Sends one control transfer at a time to the display.
///
/// Implementations must not retry; a failed transfer is returned as
/// [`BoardError::Transfer`](crate::BoardError::Transfer) and the caller
/// decides what happens next.
pub trait Transport {
    /// Perform a host-to-device control transfer, returning the number of
    /// payload bytes written.
    fn control_transfer(&mut self, request: &ControlRequest) -> Result<usize>;
}

// ── Dry run ──────────────────────────────────────────────────────────

/// Accepts every request and logs what it would have done.
///
/// Rows that a sign of the given geometry would stall on are still
/// accepted, but logged at `warn`.
#[derive(Debug, Default)]
pub struct LoggingTransport {
    geometry: SignGeometry,
}

impl LoggingTransport {
    pub fn new(geometry: SignGeometry) -> Self {
        Self { geometry }
    }
}

impl Transport for LoggingTransport {
    fn control_transfer(&mut self, request: &ControlRequest) -> Result<usize> {
        match DisplayCommand::decode(request) {
            Some((DisplayCommand::DrawText { x, y, message }, buffer)) => {
                tracing::info!(
                    "draw_text buffer={} at ({x}, {y}): {:?}",
                    buffer.as_u8(),
                    String::from_utf8_lossy(&message)
                );
            }
            Some((DisplayCommand::SetLine { row, pixels, .. }, buffer))
                if !self.geometry.fits_line(row, pixels.len()) =>
            {
                tracing::warn!(
                    "set_line buffer={} row {row} with {} bytes does not fit a {}x{} sign",
                    buffer.as_u8(),
                    pixels.len(),
                    self.geometry.cols,
                    self.geometry.rows
                );
            }
            Some((command, buffer)) => {
                tracing::info!("{command:?} buffer={}", buffer.as_u8());
            }
            None => {
                tracing::warn!(
                    "undecodable request {:#04x}/{} value={} ({} bytes)",
                    request.request_type,
                    request.request,
                    request.value,
                    request.payload.len()
                );
            }
        }
        Ok(request.payload.len())
    }
}

// ── USB ──────────────────────────────────────────────────────────────

#[cfg(feature = "hardware")]
pub use usb::UsbTransport;

#[cfg(feature = "hardware")]
mod usb {
    use super::Transport;
    use crate::DeviceIdentity;
    use crate::error::{BoardError, Result};
    use crate::protocol::ControlRequest;
    use rusb::{Context, DeviceHandle, UsbContext};
    use std::time::Duration;

    /// Per-transfer timeout.
    const USB_TIMEOUT: Duration = Duration::from_millis(1000);

    const CONFIG_INDEX: u8 = 0;
    const INTERFACE: u8 = 0;
    const ALT_SETTING: u8 = 0;

    /// An opened readerboard with its configuration selected and its
    /// interface claimed. The interface is released on drop.
    pub struct UsbTransport {
        handle: DeviceHandle<Context>,
    }

    impl UsbTransport {
        /// Find the sign by vendor/product ID and open it.
        pub fn open(identity: DeviceIdentity) -> Result<Self> {
            let context = Context::new()
                .map_err(|e| BoardError::Configuration(format!("USB context: {e}")))?;

            let device = context
                .devices()
                .map_err(|e| BoardError::Configuration(format!("USB enumeration: {e}")))?
                .iter()
                .find(|d| {
                    d.device_descriptor().is_ok_and(|desc| {
                        desc.vendor_id() == identity.vendor_id
                            && desc.product_id() == identity.product_id
                    })
                })
                .ok_or(BoardError::DeviceNotFound(identity))?;

            let config = device
                .config_descriptor(CONFIG_INDEX)
                .map_err(|e| BoardError::Configuration(format!("read configuration: {e}")))?;

            // Only look the setting up; the firmware stalls SET_INTERFACE.
            let settings = config.interfaces().flat_map(|interface| {
                interface
                    .descriptors()
                    .map(|desc| (desc.interface_number(), desc.setting_number()))
                    .collect::<Vec<_>>()
            });
            if !has_setting(settings, INTERFACE, ALT_SETTING) {
                return Err(BoardError::Configuration(format!(
                    "configuration {} has no interface ({INTERFACE}, {ALT_SETTING})",
                    config.number()
                )));
            }

            let mut handle = device
                .open()
                .map_err(|e| BoardError::Configuration(format!("open: {e}")))?;

            // Not every platform can detach kernel drivers; a vendor-class
            // device normally has none bound anyway.
            let _ = handle.set_auto_detach_kernel_driver(true);

            handle
                .set_active_configuration(config.number())
                .map_err(|e| {
                    BoardError::Configuration(format!(
                        "set configuration {}: {e}",
                        config.number()
                    ))
                })?;
            handle.claim_interface(INTERFACE).map_err(|e| {
                BoardError::Configuration(format!("claim interface {INTERFACE}: {e}"))
            })?;

            tracing::debug!(
                "opened readerboard {identity} (bus {}, address {})",
                device.bus_number(),
                device.address()
            );

            Ok(Self { handle })
        }
    }

    impl Transport for UsbTransport {
        fn control_transfer(&mut self, request: &ControlRequest) -> Result<usize> {
            self.handle
                .write_control(
                    request.request_type,
                    request.request,
                    request.value,
                    request.index,
                    &request.payload,
                    USB_TIMEOUT,
                )
                .map_err(|e| {
                    BoardError::Transfer(format!("request {}: {e}", request.request))
                })
        }
    }

    impl Drop for UsbTransport {
        fn drop(&mut self) {
            let _ = self.handle.release_interface(INTERFACE);
        }
    }

    /// Whether `(interface, alt_setting)` appears among a configuration's
    /// interface settings.
    fn has_setting(
        settings: impl IntoIterator<Item = (u8, u8)>,
        interface: u8,
        alt_setting: u8,
    ) -> bool {
        settings
            .into_iter()
            .any(|setting| setting == (interface, alt_setting))
    }

}

// ── Test double ──────────────────────────────────────────────────────

/// Records every request and can be told to fail a given transfer.
#[cfg(test)]
pub(crate) mod fake {
    use super::Transport;
    use crate::error::{BoardError, Result};
    use crate::protocol::ControlRequest;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared log so a test can inspect traffic after the transport has
    /// been moved into (and dropped by) a controller or supervisor.
    pub type Log = Rc<RefCell<Vec<ControlRequest>>>;

    pub struct FakeTransport {
        pub log: Log,
        /// Fail the transfer with this zero-based position, if set.
        pub fail_at: Option<usize>,
        attempts: usize,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::with_log(Log::default())
        }

        pub fn with_log(log: Log) -> Self {
            Self {
                log,
                fail_at: None,
                attempts: 0,
            }
        }

        pub fn failing_at(mut self, n: usize) -> Self {
            self.fail_at = Some(n);
            self
        }

        pub fn requests(&self) -> Vec<ControlRequest> {
            self.log.borrow().clone()
        }
    }

    impl Transport for FakeTransport {
        fn control_transfer(&mut self, request: &ControlRequest) -> Result<usize> {
            let attempt = self.attempts;
            self.attempts += 1;
            if self.fail_at == Some(attempt) {
                return Err(BoardError::Transfer("device unplugged".to_string()));
            }
            self.log.borrow_mut().push(request.clone());
            Ok(request.payload.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{BufferIndex, Plane};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn logging_transport_accepts_everything() {
        let mut transport = LoggingTransport::default();
        let req = DisplayCommand::DrawText {
            x: 0,
            y: 0,
            message: b"OK".to_vec(),
        }
        .encode(BufferIndex::Zero);

        assert_eq!(transport.control_transfer(&req), Ok(4));
    }

    #[rstest]
    #[case(7, 15)]
    #[case(0, 16)]
    fn logging_transport_accepts_rows_the_sign_would_reject(
        #[case] row: u8,
        #[case] len: u8,
    ) {
        let mut transport = LoggingTransport::new(SignGeometry::default());
        let req = DisplayCommand::SetLine {
            row,
            plane: Plane::Red,
            pixels: vec![0xFF; usize::from(len)],
        }
        .encode(BufferIndex::One);

        assert_eq!(transport.control_transfer(&req), Ok(usize::from(len) + 2));
    }

    #[test]
    fn logging_transport_tolerates_garbage() {
        let mut transport = LoggingTransport::default();
        let req = ControlRequest {
            request_type: 0xC0,
            request: 42,
            value: 0,
            index: 0,
            payload: vec![],
        };
        assert_eq!(transport.control_transfer(&req), Ok(0));
    }

    #[test]
    fn fake_transport_fails_the_requested_transfer() {
        let mut transport = fake::FakeTransport::new().failing_at(1);
        let req = DisplayCommand::ShowBuffer.encode(BufferIndex::Zero);

        assert!(transport.control_transfer(&req).is_ok());
        assert!(transport.control_transfer(&req).is_err());
        assert!(transport.control_transfer(&req).is_ok());
        assert_eq!(transport.requests().len(), 2);
    }
}
