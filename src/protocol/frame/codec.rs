//! Incremental encoding and decoding of WebSocket frames.

use bytes::{Buf, BytesMut};
use log::trace;

use super::{
    frame::{Frame, FrameHeader},
    mask::apply_mask,
};
use crate::error::{CapacityError, Error, Result};

/// Decoder for inbound frames.
///
/// Feeds on a caller-owned read buffer: each call consumes at most one
/// complete frame and returns `None` when the buffer holds only part of one,
/// so decoding can resume whenever the transport has more bytes ready.
#[derive(Debug)]
pub struct FrameDecoder {
    max_frame_size: Option<usize>,
}

impl FrameDecoder {
    /// Creates a decoder enforcing the given payload size cap.
    pub fn new(max_frame_size: Option<usize>) -> Self {
        Self { max_frame_size }
    }

    /// Decodes one frame from the front of `src`, if a complete one is there.
    ///
    /// Frames whose announced length exceeds the cap (or the platform's
    /// `usize`) are rejected before any payload allocation. Masked frames are
    /// unmasked on the way out; conformant servers never mask, but accepting
    /// them costs nothing.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let Some((header, length, header_length)) = FrameHeader::parse(src) else {
            return Ok(None);
        };

        let max_frame_size = self.max_frame_size.unwrap_or(usize::MAX);
        if length > max_frame_size as u64 {
            return Err(Error::Capacity(CapacityError::FrameTooLong {
                size: length,
                max_size: max_frame_size,
            }));
        }
        let payload_length = length as usize;

        if src.len() < header_length + payload_length {
            src.reserve(header_length + payload_length - src.len());
            return Ok(None);
        }

        src.advance(header_length);
        let mut payload = src.split_to(payload_length);
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask);
        }

        trace!(
            "received frame: opcode {:?}, final {}, {} bytes",
            header.opcode, header.is_final, payload_length
        );
        Ok(Some(Frame::from_parts(header, payload.freeze())))
    }
}

/// Encoder for outbound frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder;

impl FrameEncoder {
    /// Appends the frame to `dst`, masking the payload in place if the header
    /// carries a key.
    pub fn encode(&mut self, mut frame: Frame, dst: &mut BytesMut) {
        dst.reserve(frame.len());
        frame.header.format(frame.payload.len() as u64, dst);

        let payload_start = dst.len();
        dst.extend_from_slice(&frame.payload);
        if let Some(mask) = frame.header.mask.take() {
            apply_mask(&mut dst[payload_start..], mask);
        }
    }
}
