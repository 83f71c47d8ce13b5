// Download manager backend: concurrent transfers with byte-level progress,
// cooperative cancellation, and a polling HTTP listing.

pub mod config;
pub mod engine;
pub mod server;
pub mod source;

pub use config::EngineConfig;
pub use engine::error::EngineError;
pub use engine::registry::DownloadRow;
pub use engine::DownloadEngine;
pub use server::DownloadServer;
