use thiserror::Error;
use uuid::Uuid;

use crate::source::SourceError;

/// Errors crossing the engine boundary. Only `NotFound` and `InvalidUrl`
/// ever surface to callers; the rest are contained in the execution routine
/// and show up as a logged failure plus absence from the listing.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no active transfer with id {0}")]
    NotFound(Uuid),
    #[error("invalid source url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("destination i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no free destination name for {name:?} after {attempts} attempts")]
    DestinationExhausted { name: String, attempts: u32 },
}
