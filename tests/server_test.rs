// End-to-end tests: real HTTP server, real engine, fake upstream.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures_util::stream;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use uuid::Uuid;

use download_engine::{DownloadEngine, DownloadServer, EngineConfig};

type UpstreamFeed = mpsc::UnboundedSender<Result<Bytes, io::Error>>;
type StagedBody = (u64, mpsc::UnboundedReceiver<Result<Bytes, io::Error>>);

/// Fake origin server state. Files are staged by name and streamed to the
/// first request that asks for them.
#[derive(Clone, Default)]
struct Upstream {
    staged: Arc<Mutex<HashMap<String, StagedBody>>>,
}

impl Upstream {
    /// Stage a file of `total` declared bytes and return the sender that
    /// feeds its body.
    fn stage(&self, name: &str, total: u64) -> UpstreamFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.staged.lock().insert(name.to_string(), (total, rx));
        tx
    }

    /// Stage a file whose whole body is available immediately.
    fn stage_bytes(&self, name: &str, data: &[u8]) {
        let tx = self.stage(name, data.len() as u64);
        tx.send(Ok(Bytes::copy_from_slice(data))).unwrap();
    }
}

async fn serve_staged(State(upstream): State<Upstream>, Path(name): Path<String>) -> Response {
    let staged = upstream.staged.lock().remove(&name);
    let Some((total, rx)) = staged else {
        return (StatusCode::NOT_FOUND, "no such file").into_response();
    };
    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, total)
        .body(body)
        .unwrap()
}

/// Start the fake upstream plus a full download server on ephemeral ports.
async fn start_stack(dir: &TempDir) -> (DownloadServer, Upstream, String) {
    let upstream = Upstream::default();
    let app = Router::new()
        .route("/files/{name}", get(serve_staged))
        .with_state(upstream.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let config = EngineConfig {
        download_dir: dir.path().to_path_buf(),
        max_concurrent_transfers: 4,
    };
    let engine = Arc::new(DownloadEngine::new(config).unwrap());
    let server = DownloadServer::start(engine, SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    (server, upstream, format!("http://{upstream_addr}"))
}

/// Poll the listing endpoint until `pred` accepts it, then return the rows.
async fn wait_for_listing(
    client: &reqwest::Client,
    api: &str,
    what: &str,
    pred: impl Fn(&[serde_json::Value]) -> bool,
) -> Vec<serde_json::Value> {
    for _ in 0..400 {
        let rows: Vec<serde_json::Value> = client
            .get(format!("{api}/downloads"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if pred(&rows) {
            return rows;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn test_empty_listing_returns_empty_array() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _upstream, _origin) = start_stack(&dir).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/downloads", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let rows: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert!(rows.is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_download_lifecycle_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let (server, upstream, origin) = start_stack(&dir).await;
    let client = reqwest::Client::new();
    let api = server.base_url();

    // 1. Stage a 100 KB file upstream, held open so progress is observable.
    let feed = upstream.stage("movie.bin", 100_000);

    // 2. Start the download through the API.
    let resp = client
        .post(format!("{api}/downloads"))
        .json(&serde_json::json!({
            "url": format!("{origin}/files/movie.bin"),
            "name": "movie.bin",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: serde_json::Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // 3. Deliver a quarter of the body and watch the listing catch up.
    for _ in 0..5 {
        feed.send(Ok(Bytes::from(vec![0u8; 5_000]))).unwrap();
    }
    let rows = wait_for_listing(&client, &api, "25000 bytes listed", |rows| {
        rows.iter().any(|row| row["size"] == 25_000)
    })
    .await;
    let row = rows.iter().find(|row| row["id"] == id.as_str()).unwrap();
    assert_eq!(row["name"], "movie.bin");
    assert_eq!(row["total"], 100_000);

    // 4. Cancel it; the row disappears and no file is left behind.
    let resp = client
        .delete(format!("{api}/downloads/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    wait_for_listing(&client, &api, "listing empty after cancel", |rows| {
        rows.is_empty()
    })
    .await;
    assert!(server.engine().snapshot().is_empty());
    assert!(!dir.path().join("movie.bin").exists());
    assert!(!dir.path().join(format!("{id}.part")).exists());

    // 5. Cancelling again reports the id as unknown.
    let resp = client
        .delete(format!("{api}/downloads/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    server.shutdown();
}

#[tokio::test]
async fn test_completed_download_lands_in_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (server, upstream, origin) = start_stack(&dir).await;
    let client = reqwest::Client::new();
    let api = server.base_url();

    upstream.stage_bytes("notes.txt", b"alpha beta gamma");
    let resp = client
        .post(format!("{api}/downloads"))
        .json(&serde_json::json!({
            "url": format!("{origin}/files/notes.txt"),
            "name": "notes.txt",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    wait_for_listing(&client, &api, "download to finish", |rows| rows.is_empty()).await;
    assert_eq!(
        std::fs::read(dir.path().join("notes.txt")).unwrap(),
        b"alpha beta gamma"
    );

    server.shutdown();
}

#[tokio::test]
async fn test_error_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _upstream, _origin) = start_stack(&dir).await;
    let client = reqwest::Client::new();
    let api = server.base_url();

    // Unknown but well-formed id.
    let resp = client
        .delete(format!("{api}/downloads/{}", Uuid::now_v7()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Malformed id is treated as an id that does not exist.
    let resp = client
        .delete(format!("{api}/downloads/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Unrouted path.
    let resp = client
        .get(format!("{api}/nothing/here"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Unparseable source URL.
    let resp = client
        .post(format!("{api}/downloads"))
        .json(&serde_json::json!({ "url": "not a url" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    server.shutdown();
}
