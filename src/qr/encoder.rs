//! QR code encoder

use crate::error::Result;
use crate::models::EncodeResult;
use crate::qr::{PNG_DATA_URL_PREFIX, QrPayload};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

/// Default minimum edge length of rendered codes, in pixels
pub const DEFAULT_MIN_DIMENSION: u32 = 300;

/// QR code encoder
#[derive(Debug, Clone, Copy)]
pub struct QrEncoder {
    /// Error correction level
    ecc_level: EcLevel,
    /// Minimum width/height of the rendered image
    min_dimension: u32,
}

impl QrEncoder {
    /// Create a new QR encoder with default settings (Medium ECC)
    pub fn new() -> Self {
        Self {
            ecc_level: EcLevel::M,
            min_dimension: DEFAULT_MIN_DIMENSION,
        }
    }

    /// Create a new QR encoder with a specific error correction level
    pub fn with_ecc_level(ecc_level: EcLevel) -> Self {
        Self {
            ecc_level,
            ..Self::new()
        }
    }

    /// Override the minimum rendered edge length
    pub fn with_min_dimension(mut self, min_dimension: u32) -> Self {
        self.min_dimension = min_dimension.max(1);
        self
    }

    /// Encode data into a QR code image
    pub fn encode(&self, payload: &QrPayload) -> Result<DynamicImage> {
        let code = QrCode::with_error_correction_level(&payload.data, self.ecc_level)?;

        let image = code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .min_dimensions(self.min_dimension, self.min_dimension)
            .build();

        Ok(DynamicImage::ImageLuma8(image))
    }

    /// Encode a string into a QR code image
    pub fn encode_string(&self, data: &str) -> Result<DynamicImage> {
        let payload = QrPayload::from_string(data.to_string());
        self.encode(&payload)
    }

    /// Encode bytes into a QR code image
    pub fn encode_bytes(&self, data: &[u8]) -> Result<DynamicImage> {
        let payload = QrPayload::from_bytes(data.to_vec());
        self.encode(&payload)
    }

    /// Encode a string into PNG bytes
    pub fn encode_png(&self, data: &str) -> Result<Vec<u8>> {
        let image = self.encode_string(data)?;
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }

    /// Encode a string into an embeddable `data:image/png;base64,` URL
    pub fn encode_data_url(&self, data: &str) -> Result<EncodeResult> {
        let png = self.encode_png(data)?;
        let mut url = String::with_capacity(PNG_DATA_URL_PREFIX.len() + png.len() * 4 / 3 + 4);
        url.push_str(PNG_DATA_URL_PREFIX);
        STANDARD.encode_string(&png, &mut url);
        Ok(EncodeResult::new(url))
    }
}

impl Default for QrEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an error correction level name (`l`, `m`, `q`, `h`), case-insensitive.
pub fn parse_ecc_level(value: &str) -> Option<EcLevel> {
    match value.trim().to_ascii_lowercase().as_str() {
        "l" | "low" => Some(EcLevel::L),
        "m" | "medium" => Some(EcLevel::M),
        "q" | "quartile" => Some(EcLevel::Q),
        "h" | "high" => Some(EcLevel::H),
        _ => None,
    }
}
