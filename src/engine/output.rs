// Destination handling: staging files and collision-free final naming.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tokio::fs::{self, File, OpenOptions};
use tracing::debug;
use uuid::Uuid;

use super::error::EngineError;
use crate::config::{FALLBACK_NAME, MAX_DESTINATION_ATTEMPTS};

/// Destination directory for finished files. Transfers write to a
/// per-transfer `<id>.part` staging file beside the finals, so nothing ever
/// sits at a final name before it is complete.
#[derive(Debug, Clone)]
pub struct Output {
    dir: PathBuf,
}

impl Output {
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn staging_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.part"))
    }

    pub async fn create_staging(&self, id: Uuid) -> Result<File, EngineError> {
        Ok(File::create(self.staging_path(id)).await?)
    }

    /// Best-effort removal of a staging file after cancellation or failure.
    pub async fn discard_staging(&self, id: Uuid) {
        let _ = fs::remove_file(self.staging_path(id)).await;
    }

    /// Move a finished staging file to its final name, appending `(n)` to
    /// the stem while the candidate is taken. The candidate is reserved
    /// with create-new so a concurrent finalize cannot claim the same name
    /// between the existence check and the rename.
    pub async fn finalize(&self, id: Uuid, name: &str) -> Result<PathBuf, EngineError> {
        let staging = self.staging_path(id);
        for attempt in 0..MAX_DESTINATION_ATTEMPTS {
            let candidate = self.dir.join(numbered_name(name, attempt));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(reserved) => {
                    drop(reserved);
                    // A failed rename must not leave the empty reservation
                    // sitting at the final name.
                    if let Err(err) = fs::rename(&staging, &candidate).await {
                        let _ = fs::remove_file(&candidate).await;
                        return Err(err.into());
                    }
                    debug!("finalized {} as {}", id, candidate.display());
                    return Ok(candidate);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::DestinationExhausted {
            name: name.to_string(),
            attempts: MAX_DESTINATION_ATTEMPTS,
        })
    }
}

/// `name.ext` for the first attempt, `name(n).ext` afterwards.
fn numbered_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(FALLBACK_NAME);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}({attempt}).{ext}"),
        None => format!("{stem}({attempt})"),
    }
}

/// Reduce a requested display name to a bare file name: path components are
/// stripped, empty and dot-only names rejected.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let base = Path::new(raw.trim()).file_name()?.to_str()?;
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

/// Pick the display name for a transfer: the requested one if usable, else
/// the last non-empty URL path segment, else a fixed default.
pub fn display_name(url: &Url, requested: Option<&str>) -> String {
    requested
        .and_then(sanitize_name)
        .or_else(|| {
            url.path_segments()
                .and_then(|segments| segments.rev().find(|s| !s.is_empty()).map(str::to_string))
                .and_then(|segment| sanitize_name(&segment))
        })
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}
