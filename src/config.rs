use std::path::PathBuf;

use serde::Deserialize;

/// Default port for the HTTP facade when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 3000;

/// Default number of transfers allowed to run at the same time.
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 4;

/// Attempts at picking a free destination name before giving up.
pub const MAX_DESTINATION_ATTEMPTS: u32 = 10;

/// Display name used when neither the request nor the URL yields one.
pub const FALLBACK_NAME: &str = "download";

/// Top-level configuration for the download engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Directory finished files land in. Created at startup if missing.
    pub download_dir: PathBuf,
    /// Maximum number of transfers executing concurrently; additional
    /// transfers wait in `Pending` until a slot frees up.
    pub max_concurrent_transfers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
        }
    }
}
