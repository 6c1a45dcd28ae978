//! File-backed token storage.
//!
//! One JSON document per resource. File names are the SHA-256 digest of the
//! resource key, so arbitrary keys (including ones containing `/` or `..`) can
//! never escape the base directory. Writes land in a temporary file that is
//! synced and renamed over the target, so readers and crashes never observe a
//! partial document.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{StorageError, TokenResult};
use crate::storage::TokenStorage;
use crate::types::Entry;

const ENTRY_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".tmp-";

/// File-backed token storage implementation.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    directory: PathBuf,
}

impl FileTokenStorage {
    /// Open storage rooted at `directory`, creating it (mode `0700`) if missing.
    pub fn new(directory: impl AsRef<Path>) -> TokenResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.is_dir() {
            create_private_dir(&directory).map_err(|e| StorageError::io(&directory, e))?;
        }
        Ok(Self { directory })
    }

    /// Base directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file holding `resource`.
    pub fn path_for(&self, resource: &str) -> PathBuf {
        let digest = Sha256::digest(resource.as_bytes());
        self.directory
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION))
    }

    async fn read_entry(&self, path: &Path) -> TokenResult<Option<Entry>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path, e).into()),
        };

        let entry = serde_json::from_slice::<Entry>(&bytes).map_err(|e| StorageError::Corrupted {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Some(entry))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> TokenResult<()> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let temp_path = self.directory.join(format!(
            "{}{}-{:016x}",
            TEMP_PREFIX,
            file_name,
            rand::random::<u64>()
        ));

        let result = async {
            let mut options = tokio::fs::OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            options.mode(0o600);

            let mut file = options.open(&temp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);

            tokio::fs::rename(&temp_path, path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::io(path, e).into());
        }
        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(directory: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(directory)
}

#[cfg(not(unix))]
fn create_private_dir(directory: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(directory)
}

fn is_entry_file(path: &Path) -> bool {
    let is_hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(true);
    !is_hidden && path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION)
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn store(&self, entry: Entry) -> TokenResult<()> {
        entry.validate()?;

        let bytes = serde_json::to_vec_pretty(&entry).map_err(|e| StorageError::Serialization {
            message: e.to_string(),
        })?;
        let path = self.path_for(entry.resource());
        self.write_atomic(&path, &bytes).await?;

        debug!(resource = %entry.resource(), path = %path.display(), "stored token file");
        Ok(())
    }

    async fn lookup(&self, resource: &str) -> TokenResult<Option<Entry>> {
        let path = self.path_for(resource);
        match self.read_entry(&path).await? {
            Some(entry) if entry.resource() != resource => Err(StorageError::Corrupted {
                path,
                message: format!("file belongs to resource {}", entry.resource()),
            }
            .into()),
            found => Ok(found),
        }
    }

    async fn delete(&self, resource: &str) -> TokenResult<bool> {
        let path = self.path_for(resource);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e).into()),
        }
    }

    async fn list(&self) -> TokenResult<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| StorageError::io(&self.directory, e))?;

        let mut resources = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.directory, e))?
        {
            let path = item.path();
            if !is_entry_file(&path) {
                continue;
            }

            // Unreadable documents are skipped so one bad file cannot hide the rest.
            match self.read_entry(&path).await {
                Ok(Some(entry)) => resources.push(entry.resource().to_string()),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping token file"),
            }
        }
        Ok(resources)
    }
}
