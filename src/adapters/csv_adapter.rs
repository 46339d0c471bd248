//! CSV file market data adapter.
//!
//! One file per code, `{base_path}/{code}.csv`, with the header
//! `date,open,high,low,close,volume` followed by any number of indicator
//! columns. Empty indicator cells read as NaN.

use crate::domain::error::CombitraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::series::Series;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

const PRICE_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

fn no_data(code: &str, reason: impl Into<String>) -> CombitraderError {
    CombitraderError::NoData {
        code: code.to_string(),
        reason: reason.into(),
    }
}

fn parse_price(code: &str, column: &str, value: Option<&str>) -> Result<f64, CombitraderError> {
    let value = value.ok_or_else(|| no_data(code, format!("missing {column} column")))?;
    value
        .trim()
        .parse()
        .map_err(|e| no_data(code, format!("invalid {column} value '{value}': {e}")))
}

fn parse_indicator(value: &str) -> f64 {
    let value = value.trim();
    if value.is_empty() {
        return f64::NAN;
    }
    value.parse().unwrap_or(f64::NAN)
}

impl DataPort for CsvAdapter {
    fn load_series(&self, code: &str, end: NaiveDate) -> Result<Series, CombitraderError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path)
            .map_err(|e| no_data(code, format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| no_data(code, format!("CSV header error: {}", e)))?
            .clone();
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);
        let mut price_index = [0usize; 6];
        for (slot, name) in price_index.iter_mut().zip(PRICE_COLUMNS) {
            *slot = position(name).ok_or_else(|| no_data(code, format!("missing {name} column")))?;
        }
        let extra: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !PRICE_COLUMNS.contains(&h.trim()))
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();

        let mut bars = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); extra.len()];
        for result in rdr.records() {
            let record = result.map_err(|e| no_data(code, format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(price_index[0])
                .ok_or_else(|| no_data(code, "missing date column"))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| no_data(code, format!("invalid date format: {}", e)))?;
            if date > end {
                continue;
            }

            let volume = parse_price(code, "volume", record.get(price_index[5]))?;
            bars.push(OhlcvBar {
                date,
                open: parse_price(code, "open", record.get(price_index[1]))?,
                high: parse_price(code, "high", record.get(price_index[2]))?,
                low: parse_price(code, "low", record.get(price_index[3]))?,
                close: parse_price(code, "close", record.get(price_index[4]))?,
                volume: volume as i64,
            });
            for ((index, _), values) in extra.iter().zip(columns.iter_mut()) {
                values.push(record.get(*index).map(parse_indicator).unwrap_or(f64::NAN));
            }
        }

        if bars.is_empty() {
            return Err(no_data(code, format!("no bars on or before {end}")));
        }

        // Series::new sorts bars by date; keep indicator rows aligned.
        let mut order: Vec<usize> = (0..bars.len()).collect();
        order.sort_by_key(|&i| bars[i].date);
        let sorted: Vec<OhlcvBar> = order.iter().map(|&i| bars[i].clone()).collect();
        let mut series = Series::new(code, sorted);
        for ((_, name), values) in extra.into_iter().zip(columns) {
            let aligned = order.iter().map(|&i| values[i]).collect();
            series = series.with_column(name, aligned)?;
        }
        Ok(series)
    }

    fn list_codes(&self) -> Result<Vec<String>, CombitraderError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(code) = name_str.strip_suffix(".csv") {
                codes.push(code.to_string());
            }
        }

        codes.sort();
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume,rising_safety,rci\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000,101.0,\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000,95.0,-20\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000,98.0,10\n";

        fs::write(path.join("7203.csv"), csv_content).unwrap();
        fs::write(path.join("6758.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn load_series_reads_prices_and_columns() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter.load_series("7203", d(31)).unwrap();
        assert_eq!(series.bar_count(), 3);
        assert_eq!(series.bars[0].date, d(15));
        assert_eq!(series.bars[0].close, 105.0);
        assert_eq!(series.bars[0].volume, 50000);
        assert_eq!(series.value("rising_safety", 0), 95.0);
        assert_eq!(series.value("rci", 1), 10.0);
        assert!(series.value("rci", 2).is_nan());
    }

    #[test]
    fn load_series_stops_at_end_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter.load_series("7203", d(16)).unwrap();
        assert_eq!(series.bar_count(), 2);
        assert_eq!(series.value("rising_safety", 1), 98.0);
    }

    #[test]
    fn load_series_errors_for_missing_or_empty() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert!(matches!(
            adapter.load_series("9999", d(31)),
            Err(CombitraderError::NoData { .. })
        ));
        assert!(matches!(
            adapter.load_series("6758", d(31)),
            Err(CombitraderError::NoData { .. })
        ));
    }

    #[test]
    fn list_codes_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(adapter.list_codes().unwrap(), vec!["6758", "7203"]);
    }
}
