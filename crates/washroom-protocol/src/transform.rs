//! Optional per-frame payload transforms.
//!
//! A transform is applied to each content frame's payload on the way out and
//! reversed on the way in. Both ends must agree on the transform; none is
//! configured by default.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use washroom_core::{Result, WashroomError};

/// Key of the legacy substitution cipher
pub const LEGACY_KEY: &[u8] = b"3aaf87bdc8f86a66aa3f2bf7fda86115f8fcbd70dfb5dc7c367bbd0663c3194e";

/// Reversible transformation of a frame payload
pub trait PayloadTransform: Send + Sync + std::fmt::Debug {
    /// Transform an outbound payload
    fn encode(&self, payload: &[u8]) -> Bytes;

    /// Reverse [`PayloadTransform::encode`] on an inbound payload
    fn decode(&self, payload: &[u8]) -> Result<Bytes>;
}

/// Byte-wise Vigenère cipher: `c = (p + k) mod 256`
#[derive(Debug, Clone)]
pub struct Vigenere {
    key: Vec<u8>,
}

impl Vigenere {
    /// Create a cipher with a custom key
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(WashroomError::Config("cipher key must not be empty".into()));
        }
        Ok(Self { key })
    }

    /// Cipher keyed with [`LEGACY_KEY`]
    pub fn legacy() -> Self {
        Self {
            key: LEGACY_KEY.to_vec(),
        }
    }
}

impl PayloadTransform for Vigenere {
    fn encode(&self, payload: &[u8]) -> Bytes {
        payload
            .iter()
            .zip(self.key.iter().cycle())
            .map(|(p, k)| p.wrapping_add(*k))
            .collect()
    }

    fn decode(&self, payload: &[u8]) -> Result<Bytes> {
        Ok(payload
            .iter()
            .zip(self.key.iter().cycle())
            .map(|(c, k)| c.wrapping_sub(*k))
            .collect())
    }
}

/// Standard base-64 with padding
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64;

impl PayloadTransform for Base64 {
    fn encode(&self, payload: &[u8]) -> Bytes {
        Bytes::from(STANDARD.encode(payload))
    }

    fn decode(&self, payload: &[u8]) -> Result<Bytes> {
        STANDARD
            .decode(payload)
            .map(Bytes::from)
            .map_err(|e| WashroomError::Transform(e.to_string()))
    }
}
