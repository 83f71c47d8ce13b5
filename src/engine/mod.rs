// Engine orchestration: transfer lifecycle from start to registry removal.

pub mod downloader;
pub mod error;
pub mod output;
pub mod progress;
pub mod registry;
pub mod transfer;

use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, info, warn};
use uuid::Uuid;

use self::downloader::{Downloader, TransferOutcome};
use self::error::EngineError;
use self::output::{display_name, Output};
use self::registry::{DownloadRegistry, DownloadRow};
use self::transfer::{Transfer, TransferState};
use crate::config::EngineConfig;
use crate::source::{DataSource, HttpSource};

pub struct DownloadEngine {
    registry: Arc<DownloadRegistry>,
    downloader: Arc<Downloader>,
}

impl DownloadEngine {
    /// Build an engine that fetches over HTTP.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_source(config, Arc::new(HttpSource::new()))
    }

    /// Build an engine on top of an arbitrary source implementation.
    pub fn with_source(
        config: EngineConfig,
        source: Arc<dyn DataSource>,
    ) -> Result<Self, EngineError> {
        let output = Output::new(config.download_dir.clone())?;
        Ok(Self {
            registry: Arc::new(DownloadRegistry::new()),
            downloader: Arc::new(Downloader::new(
                source,
                output,
                config.max_concurrent_transfers,
            )),
        })
    }

    /// Register a new transfer and launch its execution routine. Returns
    /// the fresh id immediately; progress is observable via `snapshot`.
    pub fn start(&self, url: &str, name: Option<&str>) -> Result<Uuid, EngineError> {
        let parsed = Url::parse(url).map_err(|e| EngineError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EngineError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        let name = display_name(&parsed, name);
        let transfer = Arc::new(Transfer::new(url.to_string(), name));
        let id = transfer.id;
        self.registry.register(Arc::clone(&transfer));
        info!("transfer {} started: {} -> {}", id, transfer.url, transfer.name);

        let downloader = Arc::clone(&self.downloader);
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let outcome = downloader.run(&transfer).await;
            finish(&registry, &transfer, outcome);
        });

        Ok(id)
    }

    /// Raise the cancellation signal for an active transfer and return
    /// immediately; the routine observes it at the next chunk boundary.
    /// `NotFound` if the id is absent or already finished.
    pub fn cancel(&self, id: Uuid) -> Result<(), EngineError> {
        let transfer = self.registry.get(id).ok_or(EngineError::NotFound(id))?;
        transfer.cancel_token().cancel();

        // A transfer that never began running has no teardown to wait for;
        // resolve and remove it here. The routine's own removal attempt
        // finds the id absent and no-ops.
        if transfer.try_transition(TransferState::Pending, TransferState::Cancelled) {
            self.registry.unregister(id);
            info!("transfer {} cancelled before start", id);
        } else {
            info!("transfer {} cancellation requested", id);
        }
        Ok(())
    }

    /// Point-in-time listing of live transfers, in start order.
    pub fn snapshot(&self) -> Vec<DownloadRow> {
        self.registry.snapshot_all()
    }
}

/// Resolve the transfer's final state, then remove it from the listing.
/// Teardown already happened inside the routine, so removal is always the
/// last step.
fn finish(registry: &DownloadRegistry, transfer: &Transfer, outcome: TransferOutcome) {
    match outcome {
        TransferOutcome::Completed(path) => {
            transfer.try_finish(TransferState::Completed);
            let progress = transfer.progress.snapshot();
            info!(
                "transfer {} completed: {} bytes -> {}",
                transfer.id,
                progress.bytes_read,
                path.display()
            );
        }
        TransferOutcome::Cancelled => {
            transfer.try_finish(TransferState::Cancelled);
            info!("transfer {} cancelled", transfer.id);
        }
        TransferOutcome::Failed(err) => {
            transfer.record_failure(err.to_string());
            transfer.try_finish(TransferState::Failed);
        }
        TransferOutcome::Superseded => {
            debug!("transfer {} was resolved before it ran", transfer.id);
        }
    }

    if let Some(message) = transfer.take_failure() {
        warn!("transfer {} failed: {}", transfer.id, message);
    }
    registry.unregister(transfer.id);
}
