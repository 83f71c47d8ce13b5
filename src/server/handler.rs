// Axum request handlers: the polling listing, download creation, and cancel.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::DownloadEngine;

pub struct DownloadServer {
    port: u16,
    engine: Arc<DownloadEngine>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl DownloadServer {
    /// Bind `addr` (port 0 picks a free one) and serve until `shutdown`.
    pub async fn start(engine: Arc<DownloadEngine>, addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let app = Router::new()
            .route("/downloads", get(list_handler).post(create_handler))
            .route("/downloads/{id}", delete(cancel_handler))
            .fallback(fallback_handler)
            .with_state(Arc::clone(&engine));

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        info!("download server listening on port {}", port);

        Ok(Self {
            port,
            engine,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for reaching the server over loopback.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn engine(&self) -> &Arc<DownloadEngine> {
        &self.engine
    }

    /// Shutdown the server gracefully.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    url: String,
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    id: Uuid,
}

/// The path segment must be a UUID; anything else is treated as an unknown
/// download, not a malformed request.
fn parse_transfer_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// GET /downloads: point-in-time listing for the polling client.
async fn list_handler(State(engine): State<Arc<DownloadEngine>>) -> Response {
    let rows = engine.snapshot();
    debug!("listing {} active downloads", rows.len());
    Json(rows).into_response()
}

/// POST /downloads: accept a new download and hand back its id.
async fn create_handler(
    State(engine): State<Arc<DownloadEngine>>,
    Json(req): Json<StartRequest>,
) -> Response {
    match engine.start(&req.url, req.name.as_deref()) {
        Ok(id) => (StatusCode::CREATED, Json(StartResponse { id })).into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

/// DELETE /downloads/{id}: raise cancellation for an active download.
async fn cancel_handler(
    State(engine): State<Arc<DownloadEngine>>,
    Path(id): Path<String>,
) -> Response {
    let Some(id) = parse_transfer_id(&id) else {
        return (StatusCode::NOT_FOUND, "download not found").into_response();
    };

    match engine.cancel(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            debug!("cancel {} rejected: {}", id, err);
            (StatusCode::NOT_FOUND, "download not found").into_response()
        }
    }
}

async fn fallback_handler() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}
