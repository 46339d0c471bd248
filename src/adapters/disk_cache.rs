//! Disk-backed memoization cache, one JSON file per key.
//!
//! Entries live in a subdirectory the cache owns, so the configured
//! directory can be shared with other files.

use crate::domain::error::CombitraderError;
use crate::ports::cache_port::{CacheKey, CachePort};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Subdirectory of the configured cache directory holding the entries.
pub const CACHE_SUBDIR: &str = "combitrader_cache";

pub struct DiskCache {
    dir: PathBuf,
}

fn cache_error(reason: impl Into<String>) -> CombitraderError {
    CombitraderError::Cache {
        reason: reason.into(),
    }
}

impl DiskCache {
    /// Open a fresh cache under `dir`, removing whatever an earlier run left
    /// in its [`CACHE_SUBDIR`].
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, CombitraderError> {
        let dir = dir.as_ref().join(CACHE_SUBDIR);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .map_err(|e| cache_error(format!("failed to clear {}: {}", dir.display(), e)))?;
        }
        fs::create_dir_all(&dir)
            .map_err(|e| cache_error(format!("failed to create {}: {}", dir.display(), e)))?;
        debug!(dir = %dir.display(), "cache cleared");
        Ok(Self { dir })
    }

    /// Directory the entries are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CachePort for DiskCache {
    fn exists(&self, key: &CacheKey) -> bool {
        self.path(key).is_file()
    }

    fn get(&self, key: &CacheKey) -> Result<Value, CombitraderError> {
        let path = self.path(key);
        let content = fs::read_to_string(&path)
            .map_err(|e| cache_error(format!("failed to read {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn create(&self, key: &CacheKey, value: &Value) -> Result<(), CombitraderError> {
        let path = self.path(key);
        fs::write(&path, serde_json::to_string(value)?)
            .map_err(|e| cache_error(format!("failed to write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn key(code: &str) -> CacheKey {
        CacheKey::new(
            code,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
        )
    }

    #[test]
    fn create_then_get() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path().join("cache")).unwrap();
        assert!(!cache.exists(&key("7203")));
        cache.create(&key("7203"), &json!(true)).unwrap();
        assert!(cache.exists(&key("7203")));
        assert_eq!(cache.get(&key("7203")).unwrap(), json!(true));
        assert!(
            dir.path()
                .join("cache")
                .join(CACHE_SUBDIR)
                .join("7203_2024-01-01_2024-01-11.json")
                .is_file()
        );
    }

    #[test]
    fn construction_clears_stale_entries() {
        let dir = TempDir::new().unwrap();
        let first = DiskCache::new(dir.path()).unwrap();
        first.create(&key("7203"), &json!(false)).unwrap();

        let second = DiskCache::new(dir.path()).unwrap();
        assert!(!second.exists(&key("7203")));
    }

    #[test]
    fn construction_leaves_other_files_alone() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/7203.csv"), "date,close\n").unwrap();

        let cache = DiskCache::new(dir.path()).unwrap();
        cache.create(&key("7203"), &json!(true)).unwrap();
        DiskCache::new(dir.path()).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "keep me");
        assert!(dir.path().join("data/7203.csv").is_file());
        assert_eq!(cache.dir(), dir.path().join(CACHE_SUBDIR));
    }

    #[test]
    fn get_missing_is_cache_error() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path()).unwrap();
        assert!(matches!(
            cache.get(&key("6758")),
            Err(CombitraderError::Cache { .. })
        ));
    }
}
