// Authoritative id -> transfer mapping with insertion-ordered snapshots.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use super::transfer::Transfer;

/// One row of the polled listing, as serialized to clients.
///
/// `total` is -1 while the source length is unknown (or declared zero), so
/// pollers can render an indeterminate bar instead of dividing by zero.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadRow {
    pub id: Uuid,
    pub name: String,
    pub total: i64,
    pub size: u64,
}

impl DownloadRow {
    fn from_transfer(transfer: &Transfer) -> Self {
        let progress = transfer.progress.snapshot();
        let (total, size) = match progress.total_bytes {
            Some(total) if total > 0 => (total as i64, progress.bytes_read.min(total)),
            _ => (-1, progress.bytes_read),
        };
        Self {
            id: transfer.id,
            name: transfer.name.clone(),
            total,
            size,
        }
    }
}

pub struct DownloadRegistry {
    entries: RwLock<IndexMap<Uuid, Arc<Transfer>>>,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Insert under the transfer's id. Ids are fresh by construction, so
    /// this never displaces an existing entry.
    pub fn register(&self, transfer: Arc<Transfer>) {
        self.entries.write().insert(transfer.id, transfer);
    }

    /// Remove an entry, keeping the surviving rows in insertion order.
    /// Idempotent: removing an absent id is a no-op, which is what resolves
    /// the double-removal race between cancellation and natural completion.
    pub fn unregister(&self, id: Uuid) -> bool {
        self.entries.write().shift_remove(&id).is_some()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Transfer>> {
        self.entries.read().get(&id).cloned()
    }

    /// Point-in-time copy of the listing, insertion-ordered. Transfers that
    /// already reached a terminal state produce no row even when their
    /// removal has not landed yet.
    pub fn snapshot_all(&self) -> Vec<DownloadRow> {
        self.entries
            .read()
            .values()
            .filter(|transfer| !transfer.state().is_terminal())
            .map(|transfer| DownloadRow::from_transfer(transfer))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for DownloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}
