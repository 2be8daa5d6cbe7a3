//! Request, response and domain types shared by the pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// An accepted upload persisted under its generated name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    /// Unique token assigned by the ID generator
    pub id: String,
    /// Extension of the original filename, including the leading dot
    pub extension: String,
    /// Location of the stored bytes on disk
    pub storage_path: PathBuf,
}

impl UploadedAsset {
    /// Name of the stored file (`{id}{extension}`).
    pub fn file_name(&self) -> String {
        format!("{}{}", self.id, self.extension)
    }

    /// Public URL of the asset relative to the given origin (`scheme://host`).
    pub fn public_url(&self, origin: &str) -> String {
        format!(
            "{}/uploads/{}",
            origin.trim_end_matches('/'),
            self.file_name()
        )
    }
}

/// What a single request asks the encoder to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeRequest {
    /// Link to a stored image
    Image {
        /// Public URL the code should resolve to
        source_url: String,
    },
    /// Raw text or URL supplied by the caller
    Text {
        /// Text to encode verbatim
        content: String,
    },
}

impl EncodeRequest {
    /// The string handed to the encoder.
    pub fn as_str(&self) -> &str {
        match self {
            EncodeRequest::Image { source_url } => source_url,
            EncodeRequest::Text { content } => content,
        }
    }

    /// Flow this request belongs to.
    pub fn kind(&self) -> EncodeKind {
        match self {
            EncodeRequest::Image { .. } => EncodeKind::Image,
            EncodeRequest::Text { .. } => EncodeKind::Text,
        }
    }
}

/// Request flow label used by logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeKind {
    /// `POST /upload`
    Image,
    /// `POST /generate`
    Text,
}

impl EncodeKind {
    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            EncodeKind::Image => "image",
            EncodeKind::Text => "text",
        }
    }
}

impl fmt::Display for EncodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embeddable image payload (`data:image/png;base64,...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeResult(String);

impl EncodeResult {
    pub(crate) fn new(data_url: String) -> Self {
        Self(data_url)
    }

    /// Borrow the data URL
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the data URL
    pub fn into_string(self) -> String {
        self.0
    }
}

/// Body of `POST /generate`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    /// Text or URL to encode
    #[serde(default)]
    pub text: Option<String>,
}

/// Successful `POST /upload` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Always `true`
    pub success: bool,
    /// Public URL of the stored image
    pub image_url: String,
    /// QR code data URL pointing at `image_url`
    pub qr_code: String,
}

/// Successful `POST /generate` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Always `true`
    pub success: bool,
    /// QR code data URL encoding the submitted text
    pub qr_code: String,
}

/// Error body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_joins_origin() {
        let asset = UploadedAsset {
            id: "abc".into(),
            extension: ".png".into(),
            storage_path: PathBuf::from("uploads/abc.png"),
        };
        assert_eq!(
            asset.public_url("http://192.168.1.4:3000/"),
            "http://192.168.1.4:3000/uploads/abc.png"
        );
    }

    #[test]
    fn test_upload_response_uses_camel_case() {
        let body = serde_json::to_value(UploadResponse {
            success: true,
            image_url: "http://h/uploads/a.png".into(),
            qr_code: "data:image/png;base64,AA".into(),
        })
        .unwrap();
        assert_eq!(body["imageUrl"], "http://h/uploads/a.png");
        assert_eq!(body["qrCode"], "data:image/png;base64,AA");
    }

    #[test]
    fn test_encode_request_kind() {
        let req = EncodeRequest::Text {
            content: "hi".into(),
        };
        assert_eq!(req.kind(), EncodeKind::Text);
        assert_eq!(req.as_str(), "hi");
    }
}
