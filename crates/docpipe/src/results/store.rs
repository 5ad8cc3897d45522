use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StorageError;
use crate::sanitize::redact_path;

use super::document::{QnaEntry, ResultDocument};

/// Stores one JSON result document per job under a single directory.
///
/// Full writes go through a temp file and a rename so readers see either the
/// old or the new document. Amendments are read-modify-write under one
/// store-wide lock, so concurrent amendments to the same job never lose
/// entries.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl ResultStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }

    pub fn exists(&self, job_id: &str) -> bool {
        self.path_for(job_id).is_file()
    }

    /// Reads the document for a job. `Ok(None)` when none was written yet.
    pub fn read(&self, job_id: &str) -> Result<Option<ResultDocument>, StorageError> {
        read_document(&self.path_for(job_id))
    }

    /// Replaces the whole document and returns its path.
    pub fn write(&self, job_id: &str, doc: &ResultDocument) -> Result<PathBuf, StorageError> {
        let _guard = self.guard()?;
        self.write_locked(job_id, doc)
    }

    /// Appends one question/answer pair, keeping every other field.
    pub fn append_qna(
        &self,
        job_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<ResultDocument, StorageError> {
        self.amend(job_id, |doc| {
            doc.qna_history.push(QnaEntry {
                question: question.to_string(),
                answer: answer.to_string(),
            });
        })
    }

    /// Records the document URL, keeping every other field.
    pub fn set_document_url(&self, job_id: &str, url: &str) -> Result<ResultDocument, StorageError> {
        self.amend(job_id, |doc| doc.document_url = Some(url.to_string()))
    }

    fn amend<F>(&self, job_id: &str, f: F) -> Result<ResultDocument, StorageError>
    where
        F: FnOnce(&mut ResultDocument),
    {
        let _guard = self.guard()?;
        let mut doc = read_document(&self.path_for(job_id))?
            .ok_or_else(|| StorageError::MissingDocument(job_id.to_string()))?;
        f(&mut doc);
        self.write_locked(job_id, &doc)?;
        Ok(doc)
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.lock.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn write_locked(&self, job_id: &str, doc: &ResultDocument) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StorageError::CreateDirectory {
            path: self.dir.clone(),
            source: e,
        })?;

        let path = self.path_for(job_id);
        let tmp = self.dir.join(format!(".{}.json.tmp", job_id));
        let bytes = serde_json::to_vec_pretty(doc).map_err(StorageError::Serialize)?;

        let mut file = std::fs::File::create(&tmp).map_err(|e| StorageError::WriteFile {
            path: tmp.clone(),
            source: e,
        })?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| StorageError::WriteFile {
                path: tmp.clone(),
                source: e,
            })?;
        drop(file);

        std::fs::rename(&tmp, &path).map_err(|e| StorageError::MoveFile {
            from: tmp.clone(),
            to: path.clone(),
            source: e,
        })?;

        log::debug!("Wrote result document {}", redact_path(&path));
        Ok(path)
    }
}

fn read_document(path: &Path) -> Result<Option<ResultDocument>, StorageError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::MalformedDocument {
            path: path.to_path_buf(),
            source: e,
        })
}
