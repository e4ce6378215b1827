//! zlib-stream frame decoder
//!
//! With `compress=zlib-stream` the whole connection is one zlib stream. A
//! message may be split over several binary frames, and a message is complete
//! once the accumulated bytes end with the sync-flush marker `00 00 FF FF`.
//! The inflate context must persist across messages because later messages
//! reference the dictionary built by earlier ones.

use crate::error::DecodeError;
use crate::protocol::GatewayMessage;
use flate2::{Decompress, FlushDecompress, Status};

/// Trailer of every complete zlib-stream message
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

const MIN_OUTPUT_RESERVE: usize = 4 * 1024;

/// Reassembles and inflates gateway frames for one connection
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    output: Vec<u8>,
    inflater: Decompress,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            output: Vec::new(),
            inflater: Decompress::new(true),
        }
    }

    /// Feed one binary frame
    ///
    /// Returns `Ok(None)` while the message is still incomplete. On error the
    /// pending bytes are discarded so the next message starts clean.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<GatewayMessage>, DecodeError> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() < ZLIB_SUFFIX.len() || !self.buffer.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let result = self.inflate().and_then(|text| Ok(GatewayMessage::from_json(&text)?));
        self.buffer.clear();
        result.map(Some)
    }

    /// Decode an uncompressed text frame
    pub fn decode_text(&self, text: &str) -> Result<GatewayMessage, DecodeError> {
        Ok(GatewayMessage::from_json(text)?)
    }

    /// Bytes waiting for the rest of their message
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered bytes and the inflate context for a new connection
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.output.clear();
        self.inflater.reset(true);
    }

    fn inflate(&mut self) -> Result<String, DecodeError> {
        self.output.clear();
        let mut consumed = 0;

        loop {
            if self.output.capacity() - self.output.len() < MIN_OUTPUT_RESERVE {
                self.output.reserve(self.buffer.len().max(MIN_OUTPUT_RESERVE) * 2);
            }

            let (in_before, out_before) = (self.inflater.total_in(), self.inflater.total_out());
            let status = self.inflater.decompress_vec(
                &self.buffer[consumed..],
                &mut self.output,
                FlushDecompress::Sync,
            )?;
            consumed += (self.inflater.total_in() - in_before) as usize;

            let progressed =
                self.inflater.total_in() != in_before || self.inflater.total_out() != out_before;
            let has_room = self.output.len() < self.output.capacity();

            if status == Status::StreamEnd || !progressed || (consumed >= self.buffer.len() && has_room) {
                break;
            }
        }

        Ok(String::from_utf8(std::mem::take(&mut self.output))?)
    }
}
