use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use docqa_core::domain::Chunk;
use docqa_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub(crate) const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub format_version: u32,
    pub model: String,
    pub dims: Option<u32>,
    pub chunk_count: u32,
}

/// File layout of a saved index. The status file is written last, so its
/// presence marks a complete save.
#[derive(Debug, Clone)]
pub(crate) struct IndexFiles {
    dir: PathBuf,
}

impl IndexFiles {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.join("index_status.json")
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.dir.join("index_chunks.json")
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join("index_vectors.json")
    }

    pub fn hashes_path(&self) -> PathBuf {
        self.dir.join("index_hashes.json")
    }

    pub fn ensure_dir(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::new("AI_INDEX_SAVE_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.dir.display(), e))
        })
    }

    pub fn write_all(
        &self,
        status: &IndexStatus,
        chunks: &[Chunk],
        vectors: &BTreeMap<String, Vec<f32>>,
        hashes: &BTreeMap<String, String>,
    ) -> Result<(), AppError> {
        self.ensure_dir()?;
        write_json_atomic(&self.chunks_path(), chunks, "index chunks")?;
        write_json_atomic(&self.vectors_path(), vectors, "index vectors")?;
        write_json_atomic(&self.hashes_path(), hashes, "index hashes")?;
        write_json_atomic(&self.status_path(), status, "index status")
    }
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("AI_INDEX_SAVE_FAILED", format!("Failed to encode {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("AI_INDEX_SAVE_FAILED", format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("AI_INDEX_SAVE_FAILED", format!("Failed to finalize {what} write"))
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("AI_INDEX_LOAD_FAILED", format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("AI_INDEX_CORRUPT", format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}
