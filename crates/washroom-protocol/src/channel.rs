//! Request/response channel over one peer transport.
//!
//! A [`Channel`] wraps any byte stream in the chunk codec and adds the
//! safety limits the raw codec cannot enforce on its own: a deadline on each
//! complete inbound message, a deadline on each outbound write, and a bound
//! on the size of a reassembled logical message.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::codec::{ChunkCodec, Fragment, Inbound};
use crate::frame::{DEFAULT_MAX_CHUNK_LEN, DEFAULT_MAX_INBOUND_CHUNK_LEN};
use crate::transform::PayloadTransform;
use washroom_core::{Result, WashroomError};

/// Default bound on a reassembled logical message (64 MiB)
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Default deadline for one complete inbound message
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for one outbound write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default slowest accepted rate for streamed content (16 KiB/s)
pub const DEFAULT_MIN_TRANSFER_RATE: u64 = 16 * 1024;

/// Byte stream a peer is reached through
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased transport held by the registry
pub type BoxedTransport = Box<dyn Transport>;

/// Channel over a type-erased transport
pub type PeerChannel = Channel<BoxedTransport>;

/// Channel limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Maximum payload bytes per outbound frame
    pub max_chunk_len: usize,
    /// Maximum declared length accepted for one inbound frame
    pub max_inbound_chunk_len: usize,
    /// Maximum size of a reassembled inbound message
    pub max_message_len: usize,
    /// Deadline for one complete inbound message
    pub read_timeout: Duration,
    /// Deadline for one outbound message or fragment
    pub write_timeout: Duration,
    /// Slowest accepted rate, in bytes per second, for streamed content
    pub min_transfer_rate: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            max_inbound_chunk_len: DEFAULT_MAX_INBOUND_CHUNK_LEN,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            min_transfer_rate: DEFAULT_MIN_TRANSFER_RATE,
        }
    }
}

impl ChannelConfig {
    /// Set the outbound chunk cap
    pub fn with_max_chunk_len(mut self, len: usize) -> Self {
        self.max_chunk_len = len;
        self
    }

    /// Set the per-message read deadline
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the per-write deadline
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the slowest accepted rate for streamed content
    pub fn with_min_transfer_rate(mut self, bytes_per_sec: u64) -> Self {
        self.min_transfer_rate = bytes_per_sec;
        self
    }

    /// Time allowed to receive `size` bytes of streamed content
    pub fn transfer_timeout(&self, size: u64) -> Duration {
        let rate = self.min_transfer_rate.max(1);
        let nanos = u128::from(size % rate) * 1_000_000_000 / u128::from(rate);
        let streaming = Duration::new(size / rate, nanos as u32);
        self.read_timeout.saturating_add(streaming)
    }

    /// Set the reassembled message bound
    pub fn with_max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }

    /// Reject limits that would make the channel unusable
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_len == 0 {
            return Err(WashroomError::Config("chunk size must be at least 1 byte".into()));
        }
        if self.max_inbound_chunk_len == 0 || self.max_message_len == 0 {
            return Err(WashroomError::Config("inbound limits must be at least 1 byte".into()));
        }
        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(WashroomError::Config("timeouts must be positive".into()));
        }
        if self.min_transfer_rate == 0 {
            return Err(WashroomError::Config("minimum transfer rate must be positive".into()));
        }
        Ok(())
    }
}

/// Framed request/response channel
pub struct Channel<T> {
    framed: Framed<T, ChunkCodec>,
    config: ChannelConfig,
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T> Channel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a channel over `io`
    pub fn new(io: T, config: ChannelConfig) -> Self {
        let codec = ChunkCodec::new(config.max_chunk_len, config.max_inbound_chunk_len);
        Self {
            framed: Framed::new(io, codec),
            config,
        }
    }

    /// Create a channel whose frames pass through `transform`
    pub fn with_transform(io: T, config: ChannelConfig, transform: Arc<dyn PayloadTransform>) -> Self {
        let codec = ChunkCodec::new(config.max_chunk_len, config.max_inbound_chunk_len)
            .with_transform(transform);
        Self {
            framed: Framed::new(io, codec),
            config,
        }
    }

    /// Channel limits
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Send one complete logical message
    pub async fn send(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        trace!(size = payload.len(), "sending message");
        let write_timeout = self.config.write_timeout;
        match tokio::time::timeout(write_timeout, self.framed.send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(write_expired(write_timeout)),
        }
    }

    /// Send part of a logical message being streamed
    pub async fn send_fragment(&mut self, fragment: Fragment) -> Result<()> {
        let write_timeout = self.config.write_timeout;
        match tokio::time::timeout(write_timeout, self.framed.send(fragment)).await {
            Ok(result) => result,
            Err(_) => Err(write_expired(write_timeout)),
        }
    }

    /// Receive the next wire frame within one read timeout
    pub async fn receive_frame(&mut self) -> Result<Inbound> {
        let deadline = Instant::now() + self.config.read_timeout;
        self.receive_frame_until(deadline, self.config.read_timeout).await
    }

    /// Receive the next wire frame, failing once `deadline` passes.
    ///
    /// `budget` is the total time the caller allowed and is only reported in
    /// the error.
    pub async fn receive_frame_until(&mut self, deadline: Instant, budget: Duration) -> Result<Inbound> {
        match tokio::time::timeout_at(deadline, self.framed.next()).await {
            Err(_) => {
                debug!(timeout = ?budget, "read deadline expired");
                Err(WashroomError::Timeout(budget))
            }
            Ok(None) => Err(WashroomError::PeerClosed),
            Ok(Some(result)) => result,
        }
    }

    /// Receive one complete logical message within one read timeout
    pub async fn receive(&mut self) -> Result<Bytes> {
        let budget = self.config.read_timeout;
        let deadline = Instant::now() + budget;
        let mut message = BytesMut::new();
        loop {
            match self.receive_frame_until(deadline, budget).await? {
                Inbound::Chunk(data) => {
                    let size = message.len() + data.len();
                    if size > self.config.max_message_len {
                        return Err(WashroomError::MessageTooLarge {
                            size,
                            max: self.config.max_message_len,
                        });
                    }
                    message.extend_from_slice(&data);
                }
                Inbound::End => {
                    trace!(size = message.len(), "received message");
                    return Ok(message.freeze());
                }
            }
        }
    }

    /// Send `payload` and wait for the reply message
    pub async fn request(&mut self, payload: impl Into<Bytes>) -> Result<Bytes> {
        self.send(payload).await?;
        self.receive().await
    }

    /// Shut the transport down
    pub async fn close(&mut self) {
        if let Err(e) = self.framed.get_mut().shutdown().await {
            debug!(error = %e, "transport shutdown failed");
        }
    }
}

fn write_expired(timeout: Duration) -> WashroomError {
    debug!(timeout = ?timeout, "write deadline expired");
    WashroomError::Timeout(timeout)
}
