//! qrshare server entrypoint

use clap::Parser;
use qrshare::config::MetricsFormat;
use qrshare::{Error, QrshareConfig, Result, logging, server};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "qrshared",
    version,
    about = "Share images and text as QR codes over HTTP"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to qrshare.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(long, short, value_name = "PORT")]
    port: Option<u16>,

    /// Override the bind address (e.g. 127.0.0.1)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Directory receiving uploaded images
    #[arg(long, value_name = "DIR")]
    upload_dir: Option<PathBuf>,

    /// Directory holding the browser front-end
    #[arg(long, value_name = "DIR")]
    public_dir: Option<PathBuf>,

    /// Fixed public origin used in upload links (e.g. https://qr.example.com)
    #[arg(long, value_name = "URL")]
    public_url: Option<String>,

    /// Maximum upload size in bytes
    #[arg(long, value_name = "BYTES")]
    max_file_size: Option<u64>,

    /// Enable the /metrics endpoint and periodic metrics summaries
    #[arg(long)]
    metrics: bool,

    /// Metrics endpoint format (`json` or `prometheus`)
    #[arg(long, value_name = "FORMAT")]
    metrics_format: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut QrshareConfig) -> Result<()> {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref bind) = self.bind {
            config.server.bind_address = bind.clone();
        }
        if let Some(ref dir) = self.upload_dir {
            config.storage.upload_dir = dir.clone();
        }
        if let Some(ref dir) = self.public_dir {
            config.server.public_dir = dir.clone();
        }
        if let Some(ref url) = self.public_url {
            config.server.public_url = Some(url.clone());
        }
        if let Some(size) = self.max_file_size {
            config.storage.max_file_size = size;
        }
        if self.metrics {
            config.logging.metrics = true;
        }
        if let Some(ref format) = self.metrics_format {
            config.logging.metrics_format = format.parse::<MetricsFormat>().map_err(Error::Config)?;
            config.logging.metrics = true;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = QrshareConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config)?;

    logging::init(&config.logging)?;
    info!(
        upload_dir = %config.storage.upload_dir.display(),
        max_file_size = config.storage.max_file_size,
        "Starting qrshare"
    );

    server::serve(&config, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
