// Data source abstraction: pluggable backends behind the transfer loop.

pub mod http_source;
pub mod traits;

pub use http_source::HttpSource;
pub use traits::{ChunkStream, DataSource, SourceBody, SourceError};
