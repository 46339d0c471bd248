//! In-process cache for runs that do not need entries on disk.

use crate::domain::error::CombitraderError;
use crate::ports::cache_port::{CacheKey, CachePort};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Value>>,
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

fn poisoned() -> CombitraderError {
    CombitraderError::Cache {
        reason: "cache lock poisoned".into(),
    }
}

impl CachePort for MemoryCache {
    fn exists(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }

    fn get(&self, key: &CacheKey) -> Result<Value, CombitraderError> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| CombitraderError::Cache {
                reason: format!("no entry for {key}"),
            })
    }

    fn create(&self, key: &CacheKey, value: &Value) -> Result<(), CombitraderError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.entry(key.clone()).or_insert_with(|| value.clone());
        Ok(())
    }
}
