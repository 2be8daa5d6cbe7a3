//! HTTP surface: routes, shared state and the serve loop
//!
//! Two stateless flows share one immutable [`AppState`]:
//!
//! - `POST /upload` validates a multipart `image` field, stores it under a
//!   generated name and returns a code linking to `/uploads/{name}`.
//! - `POST /generate` encodes the submitted `{text}` directly.
//!
//! Stored uploads and the browser front-end are served as static files.

pub mod handlers;
pub mod net;

use crate::config::{MetricsFormat, QrshareConfig, ServerOptions};
use crate::error::{Error, Result};
use crate::intake::IntakeValidator;
use crate::metrics::Metrics;
use crate::qr::QrEncoder;
use crate::storage::AssetStore;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};

/// Headroom on top of the file ceiling for multipart boundaries and headers
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    /// Upload storage
    pub store: Arc<AssetStore>,
    /// Upload gatekeeper
    pub validator: IntakeValidator,
    /// Code renderer
    pub encoder: QrEncoder,
    /// Request counters
    pub metrics: Arc<Metrics>,
    /// Listener and routing options
    pub options: Arc<ServerOptions>,
    /// Host used in upload links when the request carries none
    pub fallback_host: String,
    /// Format served at `/metrics` when the endpoint is enabled
    pub metrics_format: MetricsFormat,
    metrics_enabled: bool,
}

impl AppState {
    /// Assemble state from explicit parts
    pub fn new(
        store: AssetStore,
        validator: IntakeValidator,
        encoder: QrEncoder,
        options: ServerOptions,
    ) -> Self {
        let fallback_host = format!("localhost:{}", options.port);
        Self {
            store: Arc::new(store),
            validator,
            encoder,
            metrics: Arc::new(Metrics::new()),
            options: Arc::new(options),
            fallback_host,
            metrics_format: MetricsFormat::Json,
            metrics_enabled: false,
        }
    }

    /// Build state from a loaded configuration
    pub fn from_config(config: &QrshareConfig) -> Result<Self> {
        let state = Self::new(
            AssetStore::new(&config.storage.upload_dir),
            IntakeValidator::new(config.storage.max_file_size),
            config.qr_encoder()?,
            config.server.clone(),
        );
        Ok(if config.logging.metrics {
            state.with_metrics_endpoint(config.logging.metrics_format)
        } else {
            state
        })
    }

    /// Expose `/metrics` in the given format
    pub fn with_metrics_endpoint(mut self, format: MetricsFormat) -> Self {
        self.metrics_format = format;
        self.metrics_enabled = true;
        self
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Result<Router> {
    let body_limit = usize::try_from(state.validator.max_bytes().saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    let mut api = Router::new()
        .route(
            "/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/generate", post(handlers::generate))
        .route("/healthz", get(handlers::health));

    if state.metrics_enabled {
        api = api.route("/metrics", get(handlers::metrics));
    }

    let uploads = ServeDir::new(state.store.dir());
    let public = ServeDir::new(&state.options.public_dir);
    let cors = cors_layer(&state.options.allowed_origins)?;

    Ok(api
        .nest_service("/uploads", uploads)
        .fallback_service(public)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state))
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    if allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| Error::Config(format!("Invalid CORS origin '{origin}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}

/// Bind, announce the reachable URLs and serve until `shutdown` resolves.
pub async fn serve<F>(config: &QrshareConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::from_config(config)?;

    if let Err(err) = state.store.ensure_dir().await {
        // Not fatal: each upload retries and fails on its own.
        warn!(error = %err, "Upload directory unavailable at startup");
    }
    if !config.server.public_dir.is_dir() {
        warn!(
            dir = %config.server.public_dir.display(),
            "Front-end directory not found; only the API will be served"
        );
    }

    let reporter = config
        .logging
        .metrics
        .then(|| state.metrics.spawn_reporter(config.logging.metrics_interval_secs));

    let app = router(state)?;
    let bind_addr = config.server.socket_address();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| Error::Config(format!("Failed to bind {bind_addr}: {e}")))?;
    let port = listener.local_addr()?.port();

    let (local, network) = net::announce_urls(port);
    info!("Server running on:");
    info!("- Local:   {local}");
    info!("- Network: {network}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    if let Some(reporter) = reporter {
        reporter.abort();
    }
    info!("Server stopped");
    Ok(())
}
