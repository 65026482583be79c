//! Media host (avatar and cover image storage).
//!
//! Request bodies are staged to disk as [`StagedFile`]s, then handed to a
//! [`BlobStore`] which returns the public URL and the host id used for later
//! deletion. A staged file removes itself when dropped, so every exit path of a
//! handler (success, validation failure, upload failure) cleans up after itself.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::store::Asset;

mod http;

pub use http::HttpBlobStore;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a local file. `None` means the upload failed; the cause is logged
    /// by the implementation.
    async fn upload(&self, path: &Path) -> Option<Asset>;

    /// # Errors
    /// Returns an error if the host refuses or cannot be reached.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Delete an asset, logging instead of failing. Used for cleanup of replaced or
/// orphaned assets where the request outcome must not depend on the host.
pub async fn delete_best_effort(blobs: &dyn BlobStore, asset: &Asset) {
    if let Err(err) = blobs.delete(&asset.id).await {
        warn!("Failed to delete media asset {}: {err:#}", asset.id);
    }
}

/// A request file written to the upload directory.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    /// Write `bytes` under `dir` with a fresh ULID name, keeping the extension of
    /// `original_name` when it looks sane.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn write(dir: &Path, original_name: Option<&str>, bytes: &[u8]) -> Result<Self> {
        let extension = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(str::to_ascii_lowercase);
        let file_name = match extension {
            Some(ext) => format!("{}.{ext}", Ulid::new()),
            None => Ulid::new().to_string(),
        };
        let path = dir.join(file_name);
        // Construct first so a partially written file is still removed.
        let staged = Self { path };
        tokio::fs::write(&staged.path, bytes)
            .await
            .with_context(|| format!("failed to stage upload at {}", staged.path.display()))?;
        debug!("Staged upload at {}", staged.path.display());
        Ok(staged)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove staged file {}: {err}", self.path.display()),
        }
    }
}

/// In-process media host for tests and local runs.
#[derive(Default)]
pub struct MemoryBlobStore {
    assets: Mutex<HashMap<String, String>>,
    deleted: Mutex<Vec<String>>,
    fail_uploads: AtomicBool,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following upload fail (or succeed again).
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub async fn stored_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.assets.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &Path) -> Option<Asset> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            warn!("Upload of {} rejected", path.display());
            return None;
        }
        if let Err(err) = tokio::fs::metadata(path).await {
            warn!("Upload of {} failed: {err}", path.display());
            return None;
        }
        let id = Ulid::new().to_string();
        let url = format!("memory://media/{id}");
        self.assets.lock().await.insert(id.clone(), url.clone());
        Some(Asset { url, id })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.assets
            .lock()
            .await
            .remove(id)
            .with_context(|| format!("unknown media asset {id}"))?;
        self.deleted.lock().await.push(id.to_string());
        Ok(())
    }
}
