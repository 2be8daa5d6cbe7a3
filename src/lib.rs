//! qrshare - turn uploaded images or text into shareable QR codes
//!
//! A small HTTP service with two flows:
//!
//! - **Image**: an uploaded picture is validated, stored under a generated
//!   name and served from `/uploads/{name}`; the returned QR code links to it.
//! - **Text**: arbitrary text or a URL is encoded directly.
//!
//! Both return the code as an embeddable PNG data URL.
//!
//! # Example
//!
//! ```no_run
//! use qrshare::{QrshareConfig, server};
//!
//! #[tokio::main]
//! async fn main() -> qrshare::Result<()> {
//!     let config = QrshareConfig::load(None)?;
//!     server::serve(&config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]

pub mod config;
pub mod error;
pub mod intake;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod qr;
pub mod server;
pub mod storage;

// Re-exports for convenience
pub use error::{Error, Result};

pub use config::{
    EncoderOptions, LogRotation, LoggingOptions, MetricsFormat, QrshareConfig, ServerOptions,
    StorageOptions,
};
pub use intake::{Candidate, IntakeValidator};
pub use models::{EncodeKind, EncodeRequest, EncodeResult, UploadedAsset};
pub use qr::{QrDecoder, QrEncoder, QrPayload};
pub use server::{AppState, router};
pub use storage::{AssetStore, IdGenerator, SequentialIds, UuidIds};
