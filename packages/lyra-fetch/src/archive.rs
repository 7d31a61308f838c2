use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FetchError, Result};

/// References to archived artifacts for a single fetch (spec 4.4 step 6 /
/// DATA MODEL `Page.archive refs`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveRefs {
    pub warc_path: Option<String>,
    pub har_path: Option<String>,
    pub screenshot_path: Option<String>,
}

/// One CDXJ-like index entry: a line-oriented, content-addressed record
/// pointing at the archived body on disk. Not a real WARC writer — the
/// spec calls this "WARC-like" deliberately (GLOSSARY: "not the indexing
/// mechanism itself").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdxjRecord {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
    pub body_path: String,
    pub status: u16,
}

/// Writes fetched bodies under `base_dir/archive/<sha256>` and appends a
/// CDXJ-like index line under `base_dir/archive/index.cdxj`.
pub struct Archiver {
    base_dir: PathBuf,
}

impl Archiver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn archive_body(&self, url: &str, status: u16, body: &[u8]) -> Result<ArchiveRefs> {
        let archive_dir = self.base_dir.join("archive");
        std::fs::create_dir_all(&archive_dir)
            .map_err(|e| FetchError::Archive(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(body);
        let hash = format!("{:x}", hasher.finalize());

        let body_path = archive_dir.join(&hash);
        if !body_path.exists() {
            std::fs::write(&body_path, body).map_err(|e| FetchError::Archive(e.to_string()))?;
        }

        let record = CdxjRecord {
            url: url.to_string(),
            timestamp: Utc::now(),
            content_hash: hash.clone(),
            body_path: body_path.display().to_string(),
            status,
        };
        self.append_index(&record)?;

        Ok(ArchiveRefs {
            warc_path: Some(body_path.display().to_string()),
            har_path: None,
            screenshot_path: None,
        })
    }

    pub fn archive_screenshot(&self, domain: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.base_dir.join("screenshots");
        std::fs::create_dir_all(&dir).map_err(|e| FetchError::Archive(e.to_string()))?;
        let path = dir.join(format!("{domain}-{}.png", Utc::now().timestamp_millis()));
        std::fs::write(&path, bytes).map_err(|e| FetchError::Archive(e.to_string()))?;
        Ok(path)
    }

    fn append_index(&self, record: &CdxjRecord) -> Result<()> {
        use std::io::Write;
        let index_path = self.index_path();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&index_path)
            .map_err(|e| FetchError::Archive(e.to_string()))?;
        let line = serde_json::to_string(record).map_err(|e| FetchError::Archive(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| FetchError::Archive(e.to_string()))?;
        Ok(())
    }

    pub fn index_path(&self) -> PathBuf {
        self.base_dir.join("archive").join("index.cdxj")
    }

    pub fn read_index(&self) -> Result<Vec<CdxjRecord>> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path).map_err(|e| FetchError::Archive(e.to_string()))?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(|e| FetchError::Archive(e.to_string())))
            .collect()
    }
}

pub fn domain_first_visit_marker(base_dir: &Path, domain: &str) -> bool {
    !base_dir.join("screenshots").join(format!("{domain}.visited")).exists()
}
