// Transfer execution: streams source chunks into a staging file, observing
// cancellation at every chunk boundary.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::debug;

use super::error::EngineError;
use super::output::Output;
use super::transfer::{Transfer, TransferState};
use crate::source::DataSource;

/// How a routine resolved its transfer.
pub enum TransferOutcome {
    /// All bytes fetched; the staging file was finalized at this path.
    Completed(PathBuf),
    /// Cancellation observed; the staging file was discarded.
    Cancelled,
    /// Source or destination error; the staging file was discarded.
    Failed(EngineError),
    /// Another path resolved the transfer before it began running.
    Superseded,
}

enum StreamEnd {
    Finished,
    Cancelled,
}

pub struct Downloader {
    source: Arc<dyn DataSource>,
    output: Output,
    permits: Arc<Semaphore>,
}

impl Downloader {
    pub fn new(source: Arc<dyn DataSource>, output: Output, max_concurrent: usize) -> Self {
        Self {
            source,
            output,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Run one transfer to a terminal outcome. Teardown of the staging file
    /// (discard or finalize) is complete by the time this returns.
    pub async fn run(&self, transfer: &Transfer) -> TransferOutcome {
        let token = transfer.cancel_token();

        // Wait for an execution slot, bailing promptly if cancelled first.
        let _permit = tokio::select! {
            permit = self.permits.acquire() => match permit {
                Ok(permit) => permit,
                // The semaphore is never closed while the engine lives.
                Err(e) => {
                    return TransferOutcome::Failed(EngineError::Io(io::Error::new(
                        io::ErrorKind::Other,
                        e.to_string(),
                    )))
                }
            },
            _ = token.cancelled() => {
                debug!("transfer {} cancelled while waiting for a slot", transfer.id);
                return TransferOutcome::Cancelled;
            }
        };

        // A cancel that arrived before this point may have resolved the
        // still-pending transfer already.
        if !transfer.try_transition(TransferState::Pending, TransferState::Running) {
            return TransferOutcome::Superseded;
        }

        match self.stream_to_staging(transfer).await {
            Ok(StreamEnd::Finished) => {
                match self.output.finalize(transfer.id, &transfer.name).await {
                    Ok(path) => TransferOutcome::Completed(path),
                    Err(err) => {
                        self.output.discard_staging(transfer.id).await;
                        TransferOutcome::Failed(err)
                    }
                }
            }
            Ok(StreamEnd::Cancelled) => {
                self.output.discard_staging(transfer.id).await;
                TransferOutcome::Cancelled
            }
            Err(err) => {
                self.output.discard_staging(transfer.id).await;
                TransferOutcome::Failed(err)
            }
        }
    }

    async fn stream_to_staging(&self, transfer: &Transfer) -> Result<StreamEnd, EngineError> {
        let token = transfer.cancel_token();

        // The open can stall indefinitely in the connect or header phase,
        // so it races the token like every other suspension point.
        let body = tokio::select! {
            _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
            body = self.source.open(&transfer.url) => body?,
        };
        if let Some(total) = body.total_bytes {
            transfer.progress.set_total(total);
        }

        // A cancel that arrived as the open completed is honored before
        // any disk work.
        if token.is_cancelled() {
            return Ok(StreamEnd::Cancelled);
        }

        let mut chunks = body.chunks;
        let mut file = self.output.create_staging(transfer.id).await?;

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
                next = chunks.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            file.write_all(&chunk).await?;
            // Count only bytes that reached the staging file.
            transfer.progress.add(chunk.len() as u64);

            if token.is_cancelled() {
                return Ok(StreamEnd::Cancelled);
            }
        }

        file.flush().await?;
        Ok(StreamEnd::Finished)
    }
}
