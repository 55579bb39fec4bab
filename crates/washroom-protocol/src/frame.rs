//! Chunk frame encoding and decoding.
//!
//! Every frame on the wire has the shape:
//! - Length field: chunk length as hexadecimal ASCII
//! - Delimiter: `\r\n`
//! - Payload: exactly `length` raw bytes
//! - Delimiter: `\r\n`
//!
//! A zero-length frame (`0\r\n\r\n`) terminates a logical message.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use washroom_core::{Result, WashroomError};

/// Delimiter ending the length field and the payload
pub const DELIMITER: &[u8; 2] = b"\r\n";

/// Complete terminal frame
pub const TERMINATOR: &[u8; 5] = b"0\r\n\r\n";

/// Default maximum payload bytes per outbound frame
pub const DEFAULT_MAX_CHUNK_LEN: usize = 4096;

/// Default maximum payload bytes accepted in one inbound frame (1 MiB)
pub const DEFAULT_MAX_INBOUND_CHUNK_LEN: usize = 1024 * 1024;

/// Longest length field accepted (a 64-bit value in hex)
pub const MAX_LENGTH_DIGITS: usize = 16;

/// Parsed length field of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Declared payload length
    pub length: usize,
    /// Bytes occupied by the length field and its delimiter
    pub header_len: usize,
}

impl ChunkHeader {
    /// Encode a length field for `length` payload bytes
    pub fn encode(length: usize, buf: &mut BytesMut) {
        buf.put_slice(format!("{:x}", length).as_bytes());
        buf.put_slice(DELIMITER);
    }

    /// Peek at the length field without consuming bytes.
    ///
    /// Returns `Ok(None)` while the delimiter has not arrived yet.
    pub fn peek(buf: &[u8], max_length: usize) -> Result<Option<Self>> {
        let window = &buf[..buf.len().min(MAX_LENGTH_DIGITS + DELIMITER.len())];
        let Some(end) = window.windows(2).position(|w| w == DELIMITER) else {
            if buf.len() >= MAX_LENGTH_DIGITS + DELIMITER.len() {
                return Err(WashroomError::InvalidLength(
                    String::from_utf8_lossy(&buf[..MAX_LENGTH_DIGITS]).into_owned(),
                ));
            }
            return Ok(None);
        };

        let length = parse_length(&buf[..end])?;
        if length > max_length as u64 {
            return Err(WashroomError::ChunkTooLarge {
                size: length,
                max: max_length,
            });
        }

        Ok(Some(Self {
            length: length as usize,
            header_len: end + DELIMITER.len(),
        }))
    }

    /// Get total frame size (length field + payload + trailing delimiter)
    pub fn total_frame_size(&self) -> usize {
        self.header_len + self.length + DELIMITER.len()
    }
}

/// Parse a hexadecimal length field
pub fn parse_length(field: &[u8]) -> Result<u64> {
    let invalid = || WashroomError::InvalidLength(String::from_utf8_lossy(field).into_owned());

    if field.is_empty()
        || field.len() > MAX_LENGTH_DIGITS
        || !field.iter().all(u8::is_ascii_hexdigit)
    {
        return Err(invalid());
    }

    let text = std::str::from_utf8(field).map_err(|_| invalid())?;
    u64::from_str_radix(text, 16).map_err(|_| invalid())
}

/// One frame of the wire protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload; empty for the terminal frame
    pub payload: Bytes,
}

impl Frame {
    /// Create a content frame
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Create the terminal frame
    pub fn terminal() -> Self {
        Self {
            payload: Bytes::new(),
        }
    }

    /// Check if this frame ends a logical message
    pub fn is_terminal(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encode frame to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(MAX_LENGTH_DIGITS + self.payload.len() + 2 * DELIMITER.len());
        ChunkHeader::encode(self.payload.len(), buf);
        buf.put_slice(&self.payload);
        buf.put_slice(DELIMITER);
    }

    /// Decode a frame from bytes
    /// Returns Ok(Some(frame)) if complete frame available
    /// Returns Ok(None) if more data needed
    /// Returns Err if invalid data
    pub fn decode(buf: &mut BytesMut, max_length: usize) -> Result<Option<Self>> {
        let Some(header) = ChunkHeader::peek(buf, max_length)? else {
            return Ok(None);
        };

        let total_size = header.total_frame_size();
        if buf.len() < total_size {
            // Only the declared frame is ever reserved for
            buf.reserve(total_size - buf.len());
            return Ok(None);
        }

        let trailer_start = header.header_len + header.length;
        if &buf[trailer_start..total_size] != DELIMITER {
            return Err(WashroomError::MissingDelimiter);
        }

        let mut frame_buf = buf.split_to(total_size);
        frame_buf.advance(header.header_len);
        let payload = frame_buf.split_to(header.length).freeze();

        Ok(Some(Self { payload }))
    }
}

/// Encode a complete logical message, split into frames of at most `max_chunk_len`
pub fn encode_message(payload: &[u8], max_chunk_len: usize, buf: &mut BytesMut) {
    for chunk in payload.chunks(max_chunk_len.max(1)) {
        Frame::new(Bytes::copy_from_slice(chunk)).encode(buf);
    }
    buf.put_slice(TERMINATOR);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_lengths(mut buf: BytesMut) -> Vec<usize> {
        let mut lengths = Vec::new();
        while let Some(frame) = Frame::decode(&mut buf, usize::MAX).unwrap() {
            lengths.push(frame.payload.len());
        }
        assert!(buf.is_empty());
        lengths
    }

    #[test]
    fn test_terminator_bytes() {
        let mut buf = BytesMut::new();
        Frame::terminal().encode(&mut buf);
        assert_eq!(&buf[..], TERMINATOR);
    }

    #[test]
    fn test_frame_wire_format() {
        let mut buf = BytesMut::new();
        Frame::new(&b"sysinfo"[..]).encode(&mut buf);
        assert_eq!(&buf[..], b"7\r\nsysinfo\r\n");

        let mut buf = BytesMut::new();
        Frame::new(vec![b'x'; 255]).encode(&mut buf);
        assert!(buf.starts_with(b"ff\r\n"));
    }

    #[test]
    fn test_message_split_into_capped_chunks() {
        let payload = vec![0xAB; 10_000];
        let mut buf = BytesMut::new();
        encode_message(&payload, 4096, &mut buf);

        let full_frame = "1000\r\n".len() + 4096 + 2;
        assert!(buf.starts_with(b"1000\r\n"));
        assert!(buf[full_frame..].starts_with(b"1000\r\n"));
        assert!(buf[2 * full_frame..].starts_with(b"710\r\n"));
        assert!(buf.ends_with(TERMINATOR));
        assert_eq!(buf.len(), 2 * full_frame + "710\r\n".len() + 1808 + 2 + TERMINATOR.len());
        assert_eq!(frame_lengths(buf), vec![4096, 4096, 1808, 0]);
    }

    #[test]
    fn test_empty_message_is_only_terminator() {
        let mut buf = BytesMut::new();
        encode_message(b"", 4096, &mut buf);
        assert_eq!(&buf[..], TERMINATOR);
    }

    #[test]
    fn test_decode_uppercase_length() {
        let mut buf = BytesMut::from(&b"A\r\n0123456789\r\n"[..]);
        let frame = Frame::decode(&mut buf, 4096).unwrap().unwrap();
        assert_eq!(&frame.payload[..], b"0123456789");
    }

    #[test]
    fn test_incomplete_frame() {
        let mut buf = BytesMut::from(&b"10"[..]);
        assert!(matches!(Frame::decode(&mut buf, 4096), Ok(None)));

        let mut buf = BytesMut::from(&b"10\r\nabc"[..]);
        assert!(matches!(Frame::decode(&mut buf, 4096), Ok(None)));
        // Nothing is consumed while waiting
        assert_eq!(&buf[..], b"10\r\nabc");
    }

    #[test]
    fn test_invalid_length_field() {
        let mut buf = BytesMut::from(&b"zz\r\nabc\r\n"[..]);
        let result = Frame::decode(&mut buf, 4096);
        assert!(matches!(result, Err(WashroomError::InvalidLength(_))));

        let mut buf = BytesMut::from(&b"\r\n\r\n"[..]);
        let result = Frame::decode(&mut buf, 4096);
        assert!(matches!(result, Err(WashroomError::InvalidLength(_))));
    }

    #[test]
    fn test_length_field_without_delimiter() {
        let mut buf = BytesMut::from(&b"1111111111111111111111"[..]);
        let result = Frame::decode(&mut buf, 4096);
        assert!(matches!(result, Err(WashroomError::InvalidLength(_))));
    }

    #[test]
    fn test_chunk_too_large() {
        let mut buf = BytesMut::from(&b"ffffffff\r\n"[..]);
        let result = Frame::decode(&mut buf, 4096);
        assert!(matches!(
            result,
            Err(WashroomError::ChunkTooLarge { size: 0xffff_ffff, max: 4096 })
        ));
    }

    #[test]
    fn test_missing_trailing_delimiter() {
        let mut buf = BytesMut::from(&b"3\r\nabcXY"[..]);
        let result = Frame::decode(&mut buf, 4096);
        assert!(matches!(result, Err(WashroomError::MissingDelimiter)));
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length(b"0").unwrap(), 0);
        assert_eq!(parse_length(b"1000").unwrap(), 4096);
        assert_eq!(parse_length(b"7fF").unwrap(), 0x7ff);
        assert!(parse_length(b"+10").is_err());
        assert!(parse_length(b" 10").is_err());
        assert!(parse_length(b"").is_err());
    }
}
