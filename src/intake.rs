//! Upload intake checks: declared media type, filename extension and size

use crate::error::{Error, Result};
use std::path::Path;

/// Image formats accepted for upload, matched against both the MIME subtype
/// and the filename extension.
pub const ALLOWED_FORMATS: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

/// Default upload ceiling (5 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

const TYPE_REJECTED: &str = "Only images are allowed (jpeg, jpg, png, gif, webp)!";

/// A file presented for upload.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Client-declared content type of the multipart field
    pub mime: &'a str,
    /// Client-side filename
    pub file_name: &'a str,
    /// Size of the file body in bytes
    pub len: u64,
}

/// Gatekeeper for uploaded files
#[derive(Debug, Clone, Copy)]
pub struct IntakeValidator {
    max_bytes: u64,
}

impl IntakeValidator {
    /// Create a validator with the given size ceiling in bytes
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Size ceiling in bytes
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Check the declared type and filename. Returns the original extension
    /// (leading dot, case preserved) on success.
    pub fn check_type(&self, mime: &str, file_name: &str) -> Result<String> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| is_allowed(ext))
            .ok_or_else(|| Error::Validation(TYPE_REJECTED.to_string()))?;

        if !mime_allowed(mime) {
            return Err(Error::Validation(TYPE_REJECTED.to_string()));
        }

        Ok(format!(".{extension}"))
    }

    /// Check a (possibly partial) body length against the ceiling.
    pub fn check_size(&self, len: u64) -> Result<()> {
        if len > self.max_bytes {
            return Err(Error::Validation(format!(
                "File too large (max {} bytes)",
                self.max_bytes
            )));
        }
        Ok(())
    }

    /// Run every check against a fully known candidate.
    pub fn validate(&self, candidate: &Candidate<'_>) -> Result<String> {
        let extension = self.check_type(candidate.mime, candidate.file_name)?;
        self.check_size(candidate.len)?;
        Ok(extension)
    }
}

impl Default for IntakeValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

fn is_allowed(token: &str) -> bool {
    ALLOWED_FORMATS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(token))
}

fn mime_allowed(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim();
    match essence.split_once('/') {
        Some((top, sub)) => top.eq_ignore_ascii_case("image") && is_allowed(sub),
        None => false,
    }
}
