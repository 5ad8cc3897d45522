use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::StorageError;
use crate::sanitize::sanitize_filename;

/// A client upload persisted on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Stores uploaded documents as `<job_id>_<sanitized name>`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, job_id: &str, original_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}", job_id, sanitize_filename(original_name)))
    }

    /// Streams `reader` to disk. The target must not exist yet; a partially
    /// written file is removed on error.
    pub async fn save<R>(
        &self,
        job_id: &str,
        original_name: &str,
        reader: &mut R,
    ) -> Result<StoredUpload, StorageError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: self.dir.clone(),
                source: e,
            })?;

        let path = self.path_for(job_id, original_name);

        // create_new: O_CREAT | O_EXCL, never clobbers an existing upload
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::FileExists(path));
            }
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        };

        let copied = async {
            let n = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await;

        match copied {
            Ok(size_bytes) => Ok(StoredUpload { path, size_bytes }),
            Err(e) => {
                drop(file);
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    log::warn!("Failed to remove partial upload: {}", rm);
                }
                Err(StorageError::WriteFile { path, source: e })
            }
        }
    }
}
