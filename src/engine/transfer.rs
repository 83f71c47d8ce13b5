// A single transfer: one URL being fetched, with its live state.

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::progress::ProgressTracker;

/// Lifecycle of a transfer. Pending -> Running -> one of the terminal
/// states; a terminal state is never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferState {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Cancelled,
            _ => Self::Failed,
        }
    }
}

pub struct Transfer {
    pub id: Uuid,
    pub url: String,
    pub name: String,
    pub progress: ProgressTracker,
    state: AtomicU8,
    cancel_token: CancellationToken,
    failure: Mutex<Option<String>>,
}

impl Transfer {
    pub fn new(url: String, name: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            url,
            name,
            progress: ProgressTracker::new(),
            state: AtomicU8::new(TransferState::Pending as u8),
            cancel_token: CancellationToken::new(),
            failure: Mutex::new(None),
        }
    }

    pub fn state(&self) -> TransferState {
        TransferState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Attempt the `from -> to` transition. Exactly one caller can win any
    /// given transition; everyone else sees `false`.
    pub fn try_transition(&self, from: TransferState, to: TransferState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move a live transfer into the terminal state `to`. Returns `false`
    /// when some other path already resolved the transfer.
    pub fn try_finish(&self, to: TransferState) -> bool {
        self.try_transition(TransferState::Running, to)
            || self.try_transition(TransferState::Pending, to)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Keep the error for the removal step to log.
    pub fn record_failure(&self, message: String) {
        *self.failure.lock() = Some(message);
    }

    pub fn take_failure(&self) -> Option<String> {
        self.failure.lock().take()
    }
}
