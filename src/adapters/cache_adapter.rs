//! Result caches keyed by request fingerprint.
//!
//! [`MemoryCache`] lives for one process; [`JsonDirCache`] stores one
//! `{fingerprint}.json` file per result under a directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::AlphaginiError;
use crate::ports::cache_port::CachePort;

fn cache_error(reason: impl Into<String>) -> AlphaginiError {
    AlphaginiError::Cache {
        reason: reason.into(),
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, BacktestResult>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CachePort for MemoryCache {
    fn get(&self, fingerprint: &str) -> Result<Option<BacktestResult>, AlphaginiError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| cache_error("memory cache lock poisoned"))?;
        Ok(entries.get(fingerprint).cloned())
    }

    fn put(&self, fingerprint: &str, result: &BacktestResult) -> Result<(), AlphaginiError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| cache_error("memory cache lock poisoned"))?;
        entries.insert(fingerprint.to_string(), result.clone());
        Ok(())
    }
}

pub struct JsonDirCache {
    dir: PathBuf,
}

impl JsonDirCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &str) -> Result<PathBuf, AlphaginiError> {
        if fingerprint.is_empty() || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(cache_error(format!("invalid fingerprint '{fingerprint}'")));
        }
        Ok(self.dir.join(format!("{fingerprint}.json")))
    }
}

impl CachePort for JsonDirCache {
    fn get(&self, fingerprint: &str) -> Result<Option<BacktestResult>, AlphaginiError> {
        let path = self.entry_path(fingerprint)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_error(format!("failed to read {}: {e}", path.display()))),
        };
        match serde_json::from_str(&text) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                // unreadable entries are treated as a miss and overwritten by the next put
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
                Ok(None)
            }
        }
    }

    fn put(&self, fingerprint: &str, result: &BacktestResult) -> Result<(), AlphaginiError> {
        let path = self.entry_path(fingerprint)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| cache_error(format!("failed to create {}: {e}", self.dir.display())))?;

        let json = serde_json::to_string_pretty(result)
            .map_err(|e| cache_error(format!("failed to serialize result: {e}")))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| cache_error(format!("failed to write {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            cache_error(format!("atomic rename failed: {e}"))
        })?;
        Ok(())
    }
}
