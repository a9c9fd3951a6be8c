//! The display controller: readerboard operations on top of a transport.
//!
//! The sign is double-buffered. [`Readerboard`] remembers which buffer it
//! believes is the back buffer so callers can pass `None` and draw into
//! whatever is currently hidden. The tracked value is only updated when a
//! show-buffer request succeeds; it is never read back from the device.

use crate::error::Result;
use crate::protocol::{BufferIndex, DisplayCommand, Plane};
use crate::transport::Transport;

pub struct Readerboard<T: Transport> {
    transport: T,
    back_buffer: BufferIndex,
}

impl<T: Transport> Readerboard<T> {
    /// Wrap an opened transport. Drawing starts in buffer 0.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            back_buffer: BufferIndex::Zero,
        }
    }

    /// The buffer used when an operation is called with `buffer = None`.
    pub fn back_buffer(&self) -> BufferIndex {
        self.back_buffer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Write one row of red pixel data.
    ///
    /// The protocol also has a green plane, but the firmware rejects it, so
    /// only the red transfer is sent.
    pub fn set_line(&mut self, row: u8, red_pixels: &[u8], buffer: Option<u8>) -> Result<()> {
        let buffer = self.resolve(buffer)?;
        self.send(
            DisplayCommand::SetLine {
                row,
                plane: Plane::Red,
                pixels: red_pixels.to_vec(),
            },
            buffer,
        )
    }

    /// Make `buffer` visible. The other buffer becomes the back buffer.
    pub fn show_buffer(&mut self, buffer: Option<u8>) -> Result<()> {
        let buffer = self.resolve(buffer)?;
        self.send(DisplayCommand::ShowBuffer, buffer)?;
        self.back_buffer = buffer.flip();
        Ok(())
    }

    pub fn clear_buffer(&mut self, buffer: Option<u8>) -> Result<()> {
        let buffer = self.resolve(buffer)?;
        self.send(DisplayCommand::ClearBuffer, buffer)
    }

    /// Draw `message` at (x, y). The bytes go to the firmware untouched, so
    /// they must be characters its font knows.
    pub fn draw_text(&mut self, x: u8, y: u8, message: &[u8], buffer: Option<u8>) -> Result<()> {
        let buffer = self.resolve(buffer)?;
        self.send(
            DisplayCommand::DrawText {
                x,
                y,
                message: message.to_vec(),
            },
            buffer,
        )
    }

    /// Kick off a left scroll. Returns as soon as the device accepts it; the
    /// animation runs in hardware for `frames_per_pixel * pixel_count` frames.
    pub fn scroll_left(
        &mut self,
        frames_per_pixel: u8,
        pixel_count: u8,
        buffer: Option<u8>,
    ) -> Result<()> {
        let buffer = self.resolve(buffer)?;
        self.send(
            DisplayCommand::ScrollLeft {
                frames_per_pixel,
                pixel_count,
            },
            buffer,
        )
    }

    /// Kick off a right scroll. See [`Readerboard::scroll_left`].
    pub fn scroll_right(
        &mut self,
        frames_per_pixel: u8,
        pixel_count: u8,
        buffer: Option<u8>,
    ) -> Result<()> {
        let buffer = self.resolve(buffer)?;
        self.send(
            DisplayCommand::ScrollRight {
                frames_per_pixel,
                pixel_count,
            },
            buffer,
        )
    }

    fn resolve(&self, buffer: Option<u8>) -> Result<BufferIndex> {
        match buffer {
            Some(raw) => BufferIndex::try_from(raw),
            None => Ok(self.back_buffer),
        }
    }

    fn send(&mut self, command: DisplayCommand, buffer: BufferIndex) -> Result<()> {
        let request = command.encode(buffer);
        tracing::trace!(
            "request {} value {} ({} bytes)",
            request.request,
            request.value,
            request.payload.len()
        );
        self.transport.control_transfer(&request)?;
        Ok(())
    }
}
