//! QR code decoder using rqrr

use crate::error::{Error, Result};
use crate::qr::{PNG_DATA_URL_PREFIX, QrPayload};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, GrayImage, ImageFormat};

/// QR code decoder
#[derive(Debug, Clone, Copy)]
pub struct QrDecoder {}

impl QrDecoder {
    /// Create a new QR decoder with default settings
    pub fn new() -> Self {
        Self {}
    }

    /// Decode a QR code from a `data:image/png;base64,` URL as produced by the encoder
    pub fn decode_data_url(&self, url: &str) -> Result<QrPayload> {
        let encoded = url.strip_prefix(PNG_DATA_URL_PREFIX).ok_or_else(|| {
            Error::QrDecode("Expected a base64 PNG data URL".to_string())
        })?;
        let png = STANDARD
            .decode(encoded)
            .map_err(|e| Error::QrDecode(format!("Invalid base64 payload: {e}")))?;
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?;
        self.decode(&image)
    }

    /// Decode the first QR code found in an image
    pub fn decode(&self, img: &DynamicImage) -> Result<QrPayload> {
        self.decode_gray(&img.to_luma8())
    }

    /// Decode the first QR code found in a grayscale image
    pub fn decode_gray(&self, img: &GrayImage) -> Result<QrPayload> {
        let mut prepared = rqrr::PreparedImage::prepare(img.clone());
        let grid = prepared
            .detect_grids()
            .into_iter()
            .next()
            .ok_or(Error::NoQrCodeFound)?;

        let (meta, content) = grid
            .decode()
            .map_err(|e| Error::QrDecode(format!("Decode failed: {e:?}")))?;
        tracing::trace!(
            version = ?meta.version,
            ecc_level = meta.ecc_level,
            length = content.len(),
            "Decoded QR code"
        );

        Ok(QrPayload::from_string(content))
    }

    /// Decode every readable QR code in an image
    pub fn decode_all(&self, img: &DynamicImage) -> Result<Vec<QrPayload>> {
        let mut prepared = rqrr::PreparedImage::prepare(img.to_luma8());
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Err(Error::NoQrCodeFound);
        }

        let payloads: Vec<QrPayload> = grids
            .iter()
            .filter_map(|grid| match grid.decode() {
                Ok((_meta, content)) => Some(QrPayload::from_string(content)),
                Err(e) => {
                    tracing::warn!("Skipping unreadable QR code: {e:?}");
                    None
                }
            })
            .collect();

        if payloads.is_empty() {
            return Err(Error::QrDecode("No QR codes could be decoded".to_string()));
        }
        Ok(payloads)
    }
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}
