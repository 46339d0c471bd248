//! Daily portfolio files naming the instruments a strategy picks up.
//!
//! `{dir}/{date}.csv` holding `code,price` rows, read positionally. The
//! files are normally headerless; a leading `code,price` header row is
//! skipped. Rows priced above the affordability cap are dropped and at most
//! `limit` rows are kept, in file order.

use crate::domain::error::CombitraderError;
use crate::ports::subject_port::SubjectPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Equity divided by this gives the highest affordable unit price.
pub const PRICE_DIVISOR: f64 = 500.0;

fn is_header(record: &csv::StringRecord) -> bool {
    record.get(0).map(str::trim) == Some("code") && record.get(1).map(str::trim) == Some("price")
}

pub struct CsvPortfolioSubjects {
    dir: PathBuf,
    max_price: f64,
    limit: usize,
}

impl CsvPortfolioSubjects {
    pub fn new(dir: PathBuf, max_price: f64, limit: usize) -> Self {
        Self {
            dir,
            max_price,
            limit,
        }
    }

    /// Price cap derived from starting equity.
    pub fn for_assets(dir: PathBuf, assets: f64, limit: usize) -> Self {
        Self::new(dir, assets / PRICE_DIVISOR, limit)
    }
}

impl SubjectPort for CsvPortfolioSubjects {
    fn subject(&self, date: NaiveDate) -> Result<Vec<String>, CombitraderError> {
        let path = self.dir.join(format!("{date}.csv"));
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%date, "no portfolio file");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let parse_error = |reason: String| CombitraderError::NoData {
            code: path.display().to_string(),
            reason: format!("portfolio parse error: {reason}"),
        };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut codes = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| parse_error(e.to_string()))?;
            if i == 0 && is_header(&record) {
                continue;
            }
            let (Some(code), Some(price)) = (record.get(0), record.get(1)) else {
                return Err(parse_error(format!("row {} needs code and price", i + 1)));
            };
            let price: f64 = price
                .trim()
                .parse()
                .map_err(|_| parse_error(format!("row {}: bad price {price:?}", i + 1)))?;
            if price <= self.max_price {
                codes.push(code.trim().to_string());
            }
            if codes.len() >= self.limit {
                break;
            }
        }
        Ok(codes)
    }
}
