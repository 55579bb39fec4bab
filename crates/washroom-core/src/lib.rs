//! # Washroom Core
//!
//! Core types shared by every washroom component.
//!
//! This crate provides:
//! - Peer identity and address snapshots
//! - The unified error type and its fault taxonomy
//! - The telemetry collaborator interface

pub mod error;
pub mod peer;
pub mod telemetry;

pub use error::{FaultKind, Result, WashroomError};
pub use peer::{PeerAddress, PeerId, DEFAULT_ALIAS};
pub use telemetry::{HostTelemetry, StaticTelemetry, Telemetry};
