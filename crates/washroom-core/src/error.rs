//! Error types for the washroom session server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::peer::PeerId;

/// Result type alias using WashroomError
pub type Result<T> = std::result::Result<T, WashroomError>;

/// Broad category of a failure, deciding how the console recovers from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Listener could not bind or listen; fatal to startup only
    Setup,
    /// Send/receive failure or peer EOF; the peer is torn down
    Transport,
    /// Peer violated the framing grammar or a size bound; the peer is torn down
    Protocol,
    /// Bad operator input or a local precondition; diagnostic only
    Command,
    /// Reference to a peer id the registry does not hold; diagnostic only
    NotFound,
    /// The operator terminal itself failed; ends the console loop
    Console,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Setup => write!(f, "setup"),
            FaultKind::Transport => write!(f, "transport"),
            FaultKind::Protocol => write!(f, "protocol"),
            FaultKind::Command => write!(f, "command"),
            FaultKind::NotFound => write!(f, "not-found"),
            FaultKind::Console => write!(f, "console"),
        }
    }
}

/// Unified error type for washroom operations
#[derive(Error, Debug)]
pub enum WashroomError {
    // ─────────────────────────────────────────────────────────────────────────
    // Setup Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Bind or listen failed
    #[error("cannot listen on {addr}: {source}")]
    Setup {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Socket read or write failed
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Peer closed the connection
    #[error("connection closed by peer")]
    PeerClosed,

    /// Peer did not deliver a frame before the read deadline
    #[error("peer did not respond within {0:?}")]
    Timeout(Duration),

    // ─────────────────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Length field is not a hexadecimal integer
    #[error("invalid chunk length field: {0:?}")]
    InvalidLength(String),

    /// Chunk payload not followed by CRLF
    #[error("chunk payload is not followed by a delimiter")]
    MissingDelimiter,

    /// Declared chunk length exceeds the inbound bound
    #[error("chunk of {size} bytes exceeds maximum of {max} bytes")]
    ChunkTooLarge { size: u64, max: usize },

    /// Logical message grew past the configured bound
    #[error("message of {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    /// Stream ended in the middle of a frame
    #[error("stream ended inside a frame ({0} bytes pending)")]
    TruncatedFrame(usize),

    /// Peer reply did not follow the expected grammar
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// Peer sent more content than it declared
    #[error("peer sent more than the declared {declared} bytes")]
    TransferOverrun { declared: u64 },

    /// Payload transform could not decode a frame
    #[error("payload transform failed: {0}")]
    Transform(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Command Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Operator input did not match a command's arguments
    #[error("{0}")]
    InvalidCommand(String),

    /// An I/O-bound command was issued without an active selection
    #[error("no session selected")]
    NoSelection,

    /// Transferred byte count differs from the declared size
    #[error("transfer incomplete: declared {expected} bytes, got {actual}")]
    TransferMismatch { expected: u64, actual: u64 },

    /// Local file could not be read or written
    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Peer refused a request
    #[error("peer refused: {0}")]
    Refused(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Peer id is not registered
    #[error("no peer with id {0}")]
    PeerNotFound(PeerId),

    // ─────────────────────────────────────────────────────────────────────────
    // Console Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Operator input or output failed
    #[error("console I/O error: {0}")]
    Console(#[source] std::io::Error),
}

impl WashroomError {
    /// Classify this error
    pub fn kind(&self) -> FaultKind {
        match self {
            WashroomError::Setup { .. } | WashroomError::Config(_) => FaultKind::Setup,

            WashroomError::Transport(_)
            | WashroomError::PeerClosed
            | WashroomError::Timeout(_) => FaultKind::Transport,

            WashroomError::InvalidLength(_)
            | WashroomError::MissingDelimiter
            | WashroomError::ChunkTooLarge { .. }
            | WashroomError::MessageTooLarge { .. }
            | WashroomError::TruncatedFrame(_)
            | WashroomError::MalformedReply(_)
            | WashroomError::TransferOverrun { .. }
            | WashroomError::Transform(_) => FaultKind::Protocol,

            WashroomError::InvalidCommand(_)
            | WashroomError::NoSelection
            | WashroomError::TransferMismatch { .. }
            | WashroomError::File { .. }
            | WashroomError::Refused(_) => FaultKind::Command,

            WashroomError::PeerNotFound(_) => FaultKind::NotFound,

            WashroomError::Console(_) => FaultKind::Console,
        }
    }

    /// Check if this error leaves the peer's stream unusable
    pub fn is_peer_fault(&self) -> bool {
        matches!(self.kind(), FaultKind::Transport | FaultKind::Protocol)
    }

    /// Shorthand for an operator input error
    pub fn invalid_command(message: impl Into<String>) -> Self {
        WashroomError::InvalidCommand(message.into())
    }
}
