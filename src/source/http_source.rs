use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tracing::{debug, warn};

use super::traits::{DataSource, SourceBody, SourceError};

pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn open(&self, url: &str) -> Result<SourceBody, SourceError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = resp.status();
        debug!("http open status={} url={}", status.as_u16(), url);
        if !status.is_success() {
            warn!("http open failed status={} url={}", status.as_u16(), url);
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        let total_bytes = resp.content_length();
        let chunks = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| SourceError::Read(e.to_string())))
            .boxed();

        Ok(SourceBody {
            total_bytes,
            chunks,
        })
    }
}
