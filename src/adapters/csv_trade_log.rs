//! Appendable CSV trade log, one file per run window.

use crate::domain::error::CombitraderError;
use crate::domain::trade_recorder::TradeRecord;
use crate::ports::trade_log_port::TradeLogPort;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

pub struct CsvTradeLog {
    dir: PathBuf,
}

fn log_error(reason: impl Into<String>) -> CombitraderError {
    CombitraderError::TradeLog {
        reason: reason.into(),
    }
}

impl CsvTradeLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.csv"))
    }
}

impl TradeLogPort for CsvTradeLog {
    fn append(&self, key: &str, records: &[TradeRecord]) -> Result<(), CombitraderError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| log_error(format!("failed to create {}: {}", self.dir.display(), e)))?;
        let path = self.path(key);
        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| log_error(format!("failed to open {}: {}", path.display(), e)))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| log_error(format!("failed to write {}: {}", path.display(), e)))?;
        }
        writer
            .flush()
            .map_err(|e| log_error(format!("failed to flush {}: {}", path.display(), e)))
    }
}
