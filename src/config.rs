//! qrshare runtime configuration handling

use crate::error::{Error, Result};
use crate::intake::DEFAULT_MAX_FILE_SIZE;
use crate::qr::{DEFAULT_MIN_DIMENSION, QrEncoder, parse_ecc_level};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrshareConfig {
    /// HTTP listener and routing options
    pub server: ServerOptions,
    /// Upload storage options
    pub storage: StorageOptions,
    /// QR rendering options
    pub encoder: EncoderOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl QrshareConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No qrshare.toml / qrshare.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["qrshare.toml", "qrshare.yaml", "qrshare.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("qrshare");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{}', expected toml/yaml",
                other
            ))),
        }
    }

    /// Apply environment variable overrides after file/default loading.
    fn apply_env_overrides(&mut self) {
        self.server.apply_env_overrides();
        self.storage.apply_env_overrides();
        self.encoder.apply_env_overrides();
        self.logging.apply_env_overrides();
    }

    /// Build the QR encoder described by the `encoder` section.
    pub fn qr_encoder(&self) -> Result<QrEncoder> {
        self.encoder.to_encoder()
    }
}

/// HTTP server options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Bind address for the HTTP listener
    pub bind_address: String,
    /// Bind port for the HTTP listener
    pub port: u16,
    /// Directory holding the browser front-end
    pub public_dir: PathBuf,
    /// Fixed origin (e.g. `https://qr.example.com`) used for upload links instead of the request host
    pub public_url: Option<String>,
    /// Honour `X-Forwarded-Proto` / `X-Forwarded-Host` from a reverse proxy
    pub trust_forwarded_headers: bool,
    /// Allowed browser origins for CORS; empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            public_dir: PathBuf::from("public"),
            public_url: None,
            trust_forwarded_headers: false,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(addr) = env::var("QRSHARE_BIND_ADDRESS") {
            self.bind_address = addr;
        }
        // Plain PORT is honoured for PaaS-style deployments; QRSHARE_PORT wins.
        for key in ["PORT", "QRSHARE_PORT"] {
            if let Ok(port) = env::var(key) {
                if let Ok(parsed) = port.parse::<u16>() {
                    self.port = parsed;
                }
            }
        }
        if let Ok(dir) = env::var("QRSHARE_PUBLIC_DIR") {
            self.public_dir = PathBuf::from(dir);
        }
        if let Ok(url) = env::var("QRSHARE_PUBLIC_URL") {
            if url.trim().is_empty() {
                self.public_url = None;
            } else {
                self.public_url = Some(url);
            }
        }
        if let Ok(trust) = env::var("QRSHARE_TRUST_FORWARDED") {
            if let Some(value) = parse_flag(&trust) {
                self.trust_forwarded_headers = value;
            }
        }
        if let Ok(origins) = env::var("QRSHARE_ALLOWED_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    /// Socket address helper for binding servers
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Upload storage options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Directory receiving uploaded images, also served under `/uploads`
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes
    pub max_file_size: u64,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl StorageOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("QRSHARE_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Ok(size) = env::var("QRSHARE_MAX_FILE_SIZE") {
            if let Ok(parsed) = size.parse::<u64>() {
                self.max_file_size = parsed;
            }
        }
    }
}

/// QR rendering options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    /// Error correction level (`l`, `m`, `q` or `h`)
    pub ecc_level: String,
    /// Minimum edge length of the rendered PNG in pixels
    pub min_dimension: u32,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            ecc_level: "m".to_string(),
            min_dimension: DEFAULT_MIN_DIMENSION,
        }
    }
}

impl EncoderOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("QRSHARE_QR_ECC") {
            self.ecc_level = level;
        }
        if let Ok(size) = env::var("QRSHARE_QR_MIN_DIMENSION") {
            if let Ok(parsed) = size.parse::<u32>() {
                self.min_dimension = parsed;
            }
        }
    }

    /// Resolve the options into an encoder.
    pub fn to_encoder(&self) -> Result<QrEncoder> {
        let level = parse_ecc_level(&self.ecc_level).ok_or_else(|| {
            Error::Config(format!(
                "Unknown error correction level '{}'. Use l, m, q, or h",
                self.ecc_level
            ))
        })?;
        Ok(QrEncoder::with_ecc_level(level).with_min_dimension(self.min_dimension))
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `QRSHARE_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in stdout logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
    /// Collect request metrics and expose them at `/metrics`
    pub metrics: bool,
    /// Interval in seconds for emitting aggregated metrics when enabled
    pub metrics_interval_secs: u64,
    /// Output format for the metrics endpoint (`json` or `prometheus`)
    pub metrics_format: MetricsFormat,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            color: true,
            rotation: None,
            metrics: false,
            metrics_interval_secs: 60,
            metrics_format: MetricsFormat::Json,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("QRSHARE_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("QRSHARE_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Ok(color) = env::var("QRSHARE_LOG_COLOR") {
            if let Some(value) = parse_flag(&color) {
                self.color = value;
            }
        }
        if let Ok(rotation) = env::var("QRSHARE_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::parse(&rotation) {
                self.rotation = Some(parsed);
            }
        }
        if let Ok(metrics) = env::var("QRSHARE_METRICS") {
            if let Some(value) = parse_flag(&metrics) {
                self.metrics = value;
            }
        }
        if let Ok(interval) = env::var("QRSHARE_METRICS_INTERVAL") {
            if let Ok(value) = interval.parse::<u64>() {
                self.metrics_interval_secs = value.max(5);
            }
        }
        if let Ok(format) = env::var("QRSHARE_METRICS_FORMAT") {
            if let Ok(parsed) = format.parse::<MetricsFormat>() {
                self.metrics_format = parsed;
            }
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

/// Supported serialization formats for the metrics endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    /// Emit metrics as structured JSON
    Json,
    /// Emit metrics in Prometheus text exposition format
    Prometheus,
}

impl FromStr for MetricsFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "prometheus" => Ok(Self::Prometheus),
            _ => Err(format!(
                "Unsupported metrics format '{value}', expected 'json' or 'prometheus'"
            )),
        }
    }
}
