//! Tokio codec for the chunked wire protocol.
//!
//! The decoder yields one [`Inbound`] item per wire frame so that callers can
//! enforce deadlines per frame and stream large messages without buffering
//! them. The encoder accepts either a whole logical message ([`Bytes`]) or
//! individual [`Fragment`]s of a message being streamed.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::frame::{
    Frame, DEFAULT_MAX_CHUNK_LEN, DEFAULT_MAX_INBOUND_CHUNK_LEN, TERMINATOR,
};
use crate::transform::PayloadTransform;
use washroom_core::{Result, WashroomError};

/// One decoded wire frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Content frame payload, already passed through the transform
    Chunk(Bytes),
    /// Terminal frame: the logical message is complete
    End,
}

/// Piece of an outbound logical message being streamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Content, split into capped frames as needed
    Data(Bytes),
    /// Terminal frame
    End,
}

/// Tokio codec for encoding and decoding chunked frames
#[derive(Debug, Clone)]
pub struct ChunkCodec {
    /// Maximum payload bytes per outbound frame
    max_chunk_len: usize,
    /// Maximum payload bytes accepted per inbound frame
    max_inbound_chunk_len: usize,
    /// Optional payload transform applied per frame
    transform: Option<Arc<dyn PayloadTransform>>,
    /// Statistics: frames encoded
    pub frames_encoded: u64,
    /// Statistics: frames decoded
    pub frames_decoded: u64,
}

impl ChunkCodec {
    /// Create a codec with explicit bounds
    pub fn new(max_chunk_len: usize, max_inbound_chunk_len: usize) -> Self {
        Self {
            max_chunk_len: max_chunk_len.max(1),
            max_inbound_chunk_len,
            transform: None,
            frames_encoded: 0,
            frames_decoded: 0,
        }
    }

    /// Apply a payload transform to every content frame
    pub fn with_transform(mut self, transform: Arc<dyn PayloadTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    fn encode_data(&mut self, data: &[u8], dst: &mut BytesMut) {
        for chunk in data.chunks(self.max_chunk_len) {
            let payload = match &self.transform {
                Some(transform) => transform.encode(chunk),
                None => Bytes::copy_from_slice(chunk),
            };
            Frame::new(payload).encode(dst);
            self.frames_encoded += 1;
        }
    }

    fn encode_end(&mut self, dst: &mut BytesMut) {
        dst.put_slice(TERMINATOR);
        self.frames_encoded += 1;
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_LEN, DEFAULT_MAX_INBOUND_CHUNK_LEN)
    }
}

impl Decoder for ChunkCodec {
    type Item = Inbound;
    type Error = WashroomError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match Frame::decode(src, self.max_inbound_chunk_len) {
            Ok(Some(frame)) => {
                self.frames_decoded += 1;
                trace!(payload_size = frame.payload.len(), "Decoded frame");

                if frame.is_terminal() {
                    return Ok(Some(Inbound::End));
                }
                let payload = match &self.transform {
                    Some(transform) => transform.decode(&frame.payload)?,
                    None => frame.payload,
                };
                Ok(Some(Inbound::Chunk(payload)))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(error = %e, "Frame decode error");
                Err(e)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if src.is_empty() => Ok(None),
            None => Err(WashroomError::TruncatedFrame(src.len())),
        }
    }
}

impl Encoder<Bytes> for ChunkCodec {
    type Error = WashroomError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        trace!(message_size = item.len(), "Encoding message");
        self.encode_data(&item, dst);
        self.encode_end(dst);
        Ok(())
    }
}

impl Encoder<Fragment> for ChunkCodec {
    type Error = WashroomError;

    fn encode(&mut self, item: Fragment, dst: &mut BytesMut) -> Result<()> {
        match item {
            // An empty content frame would read as a terminator
            Fragment::Data(data) if data.is_empty() => {}
            Fragment::Data(data) => self.encode_data(&data, dst),
            Fragment::End => self.encode_end(dst),
        }
        Ok(())
    }
}
