//! Memoizing cache port for expensive per-instrument checks.

use crate::domain::error::CombitraderError;
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;

/// `(code, window_start, window_end)`; renders as `code_start_end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub code: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CacheKey {
    pub fn new(code: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            code: code.into(),
            start,
            end,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.code, self.start, self.end)
    }
}

/// Entries are written once and never invalidated during a run.
pub trait CachePort {
    fn exists(&self, key: &CacheKey) -> bool;
    fn get(&self, key: &CacheKey) -> Result<Value, CombitraderError>;
    fn create(&self, key: &CacheKey, value: &Value) -> Result<(), CombitraderError>;
}

/// Return the cached value for `key`, computing and storing it on a miss.
pub fn memoize(
    cache: &dyn CachePort,
    key: &CacheKey,
    compute: impl FnOnce() -> Value,
) -> Result<Value, CombitraderError> {
    if cache.exists(key) {
        return cache.get(key);
    }
    let value = compute();
    cache.create(key, &value)?;
    Ok(value)
}
