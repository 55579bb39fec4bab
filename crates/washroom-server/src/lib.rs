//! # Washroom Server
//!
//! Console-operated session server. A background acceptor registers every
//! peer that connects; the operator console selects one peer at a time and
//! drives it over the chunked protocol.
//!
//! This crate provides:
//! - Command-line and runtime configuration
//! - The shared peer registry
//! - The connection acceptor with a shutdown handshake
//! - The operator console, its command parser and table renderer
//! - File transfers and a simulated peer

pub mod commands;
pub mod config;
pub mod console;
pub mod listener;
pub mod registry;
pub mod simulator;
pub mod table;
pub mod transfer;

pub use commands::Command;
pub use config::{Args, ServerConfig};
pub use console::{Console, ConsoleConfig, ConsoleExit, Flow, SessionState};
pub use listener::{Listener, ListenerHandle};
pub use registry::{Peer, PeerInfo, PeerLink, PeerRegistry};
pub use simulator::Simulator;
