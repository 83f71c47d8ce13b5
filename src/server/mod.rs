// HTTP facade: the endpoints the polling client consumes.

pub mod handler;

pub use handler::DownloadServer;
