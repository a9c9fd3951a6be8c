//! Wire format of the readerboard's vendor control requests.
//!
//! Every display command is a single host-to-device control transfer. The
//! `request` field picks the operation, `value` carries the target buffer,
//! and the data stage carries a two-byte header plus command data.
//!
//! ```text
//! request  operation     payload
//! 0 / 1    set line      [plane, row] + packed pixels
//! 2        show buffer   -
//! 3        clear buffer  -
//! 4        draw text     [x, y] + message bytes
//! 5        scroll left   [frames_per_pixel, pixel_count]
//! 6        scroll right  [frames_per_pixel, pixel_count]
//! ```

use crate::error::BoardError;

/// bmRequestType: direction 0 (host-to-device), type 2 (vendor),
/// recipient 0 (device).
pub const REQUEST_TYPE: u8 = 2 << 5;

pub const REQ_SHOW_BUFFER: u8 = 2;
pub const REQ_CLEAR_BUFFER: u8 = 3;
pub const REQ_DRAW_TEXT: u8 = 4;
pub const REQ_SCROLL_LEFT: u8 = 5;
pub const REQ_SCROLL_RIGHT: u8 = 6;

// ── Buffer index ─────────────────────────────────────────────────────

/// One of the sign's two frame buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferIndex {
    Zero,
    One,
}

impl BufferIndex {
    pub fn as_u8(self) -> u8 {
        match self {
            BufferIndex::Zero => 0,
            BufferIndex::One => 1,
        }
    }

    /// The other buffer.
    pub fn flip(self) -> Self {
        match self {
            BufferIndex::Zero => BufferIndex::One,
            BufferIndex::One => BufferIndex::Zero,
        }
    }
}

impl TryFrom<u8> for BufferIndex {
    type Error = BoardError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(BufferIndex::Zero),
            1 => Ok(BufferIndex::One),
            other => Err(BoardError::InvalidBuffer(other.into())),
        }
    }
}

impl TryFrom<u16> for BufferIndex {
    type Error = BoardError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(BufferIndex::Zero),
            1 => Ok(BufferIndex::One),
            other => Err(BoardError::InvalidBuffer(other)),
        }
    }
}

impl From<BufferIndex> for u16 {
    fn from(buffer: BufferIndex) -> Self {
        buffer.as_u8() as u16
    }
}

// ── Colour plane ─────────────────────────────────────────────────────

/// Colour plane selected by the first byte of a set-line payload.
///
/// The current firmware only accepts [`Plane::Red`]; green line data is
/// stalled by the device, so the controller never sends it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plane {
    Red = 0,
    Green = 1,
}

// ── Control request ──────────────────────────────────────────────────

/// One fully addressed control transfer, ready to hand to a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub payload: Vec<u8>,
}

// ── Commands ─────────────────────────────────────────────────────────

/// A display command, independent of which buffer it targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayCommand {
    /// Replace one row of packed pixel data.
    SetLine {
        row: u8,
        plane: Plane,
        pixels: Vec<u8>,
    },
    /// Make the buffer visible.
    ShowBuffer,
    /// Turn every pixel in the buffer off.
    ClearBuffer,
    /// Render text with the firmware's built-in font at (x, y).
    DrawText { x: u8, y: u8, message: Vec<u8> },
    /// Start a hardware scroll animation to the left.
    ScrollLeft {
        frames_per_pixel: u8,
        pixel_count: u8,
    },
    /// Start a hardware scroll animation to the right.
    ScrollRight {
        frames_per_pixel: u8,
        pixel_count: u8,
    },
}

impl DisplayCommand {
    /// Encode this command for `buffer`.
    pub fn encode(&self, buffer: BufferIndex) -> ControlRequest {
        let (request, payload) = match self {
            // The firmware reads the target buffer for line data out of the
            // request number itself, so set-line occupies requests 0 and 1.
            DisplayCommand::SetLine { row, plane, pixels } => {
                (buffer.as_u8(), with_header(*plane as u8, *row, pixels))
            }
            DisplayCommand::ShowBuffer => (REQ_SHOW_BUFFER, Vec::new()),
            DisplayCommand::ClearBuffer => (REQ_CLEAR_BUFFER, Vec::new()),
            DisplayCommand::DrawText { x, y, message } => {
                (REQ_DRAW_TEXT, with_header(*x, *y, message))
            }
            DisplayCommand::ScrollLeft {
                frames_per_pixel,
                pixel_count,
            } => (REQ_SCROLL_LEFT, vec![*frames_per_pixel, *pixel_count]),
            DisplayCommand::ScrollRight {
                frames_per_pixel,
                pixel_count,
            } => (REQ_SCROLL_RIGHT, vec![*frames_per_pixel, *pixel_count]),
        };

        ControlRequest {
            request_type: REQUEST_TYPE,
            request,
            value: buffer.into(),
            index: 0,
            payload,
        }
    }

    /// Decode a request produced by [`DisplayCommand::encode`].
    ///
    /// Returns `None` for anything the firmware would not accept: a foreign
    /// request type, an unknown request number, or a short payload.
    pub fn decode(req: &ControlRequest) -> Option<(DisplayCommand, BufferIndex)> {
        if req.request_type != REQUEST_TYPE {
            return None;
        }
        let buffer = BufferIndex::try_from(req.value).ok()?;

        let command = match req.request {
            0 | 1 => {
                let [plane, row, pixels @ ..] = req.payload.as_slice() else {
                    return None;
                };
                let plane = match *plane {
                    0 => Plane::Red,
                    1 => Plane::Green,
                    _ => return None,
                };
                // Line data targets the buffer named by the request number.
                let buffer = BufferIndex::try_from(req.request).ok()?;
                return Some((
                    DisplayCommand::SetLine {
                        row: *row,
                        plane,
                        pixels: pixels.to_vec(),
                    },
                    buffer,
                ));
            }
            REQ_SHOW_BUFFER => DisplayCommand::ShowBuffer,
            REQ_CLEAR_BUFFER => DisplayCommand::ClearBuffer,
            REQ_DRAW_TEXT => {
                let [x, y, message @ ..] = req.payload.as_slice() else {
                    return None;
                };
                DisplayCommand::DrawText {
                    x: *x,
                    y: *y,
                    message: message.to_vec(),
                }
            }
            REQ_SCROLL_LEFT | REQ_SCROLL_RIGHT => {
                let [frames_per_pixel, pixel_count] = req.payload.as_slice() else {
                    return None;
                };
                let (frames_per_pixel, pixel_count) = (*frames_per_pixel, *pixel_count);
                if req.request == REQ_SCROLL_LEFT {
                    DisplayCommand::ScrollLeft {
                        frames_per_pixel,
                        pixel_count,
                    }
                } else {
                    DisplayCommand::ScrollRight {
                        frames_per_pixel,
                        pixel_count,
                    }
                }
            }
            _ => return None,
        };

        Some((command, buffer))
    }
}

fn with_header(first: u8, second: u8, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(2 + data.len());
    payload.push(first);
    payload.push(second);
    payload.extend_from_slice(data);
    payload
}
