//! HTTP surface.
//!
//! Thin axum layer over [`FormFiller`]: handlers translate requests into
//! pipeline calls and [`FormFillError`](crate::FormFillError)s into
//! `{"detail": ...}` responses.

mod error;
mod handlers;
mod router;

pub use error::ApiError;
pub use handlers::FillRequest;
pub use router::create_router;

use crate::process::FormFiller;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Origins allowed by CORS when none are configured.
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Default request body limit; phone photos of forms are routinely several MB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub filler: Arc<FormFiller>,
}

impl AppState {
    pub fn new(filler: FormFiller) -> Self {
        Self {
            filler: Arc::new(filler),
        }
    }
}

/// Server-only settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, server: &ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(server.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(state, server)).await
}
