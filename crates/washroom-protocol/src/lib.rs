//! # Washroom Protocol
//!
//! Chunked, length-prefixed byte-stream protocol spoken between the washroom
//! console server and its peers.
//!
//! This crate provides:
//! - Frame encoding/decoding (`<hex-length>\r\n<payload>\r\n`, `0\r\n\r\n` terminator)
//! - Tokio codec for async framing
//! - A request/response channel with read deadlines and size bounds
//! - Directive and reply messages
//! - Optional per-frame payload transforms

pub mod channel;
pub mod codec;
pub mod directive;
pub mod frame;
pub mod transform;

pub use channel::{
    BoxedTransport, Channel, ChannelConfig, PeerChannel, Transport, DEFAULT_MAX_MESSAGE_LEN,
    DEFAULT_READ_TIMEOUT,
};
pub use codec::{ChunkCodec, Fragment, Inbound};
pub use directive::{Directive, DownloadReply};
pub use frame::{Frame, DEFAULT_MAX_CHUNK_LEN, DEFAULT_MAX_INBOUND_CHUNK_LEN, TERMINATOR};
pub use transform::{Base64, PayloadTransform, Vigenere};
