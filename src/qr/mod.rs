//! QR code encoding and decoding
//!
//! Encoding turns submitted text or upload links into PNG data URLs that a
//! browser can embed directly. Decoding reads those images back and is used to
//! check that a rendered code reproduces its input.

mod decoder;
mod encoder;

pub use decoder::QrDecoder;
pub use encoder::{DEFAULT_MIN_DIMENSION, QrEncoder, parse_ecc_level};

use serde::{Deserialize, Serialize};

/// Prefix of every data URL produced by the encoder
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A decoded QR code payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    /// The raw decoded data
    pub data: Vec<u8>,
    /// String representation if valid UTF-8
    pub text: Option<String>,
}

impl QrPayload {
    /// Create a new QR payload from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let text = String::from_utf8(data.clone()).ok();
        Self { data, text }
    }

    /// Create a new QR payload from a string
    pub fn from_string(s: String) -> Self {
        Self {
            data: s.as_bytes().to_vec(),
            text: Some(s),
        }
    }

    /// Get the payload as a string, if valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
