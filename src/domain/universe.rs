//! Fixed instrument universe: code-list parsing and data availability checks.

use crate::domain::error::CombitraderError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Universe {
    pub codes: Vec<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.codes.len()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

#[derive(Debug)]
pub struct UniverseValidationResult {
    pub universe: Universe,
    pub skipped: Vec<SkippedCode>,
}

#[derive(Debug, Clone)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    NoBarsInRange,
    InsufficientBars { bars: usize },
}

/// Check every code loads with at least `minimum` bars and some bar inside
/// `[start_date, end_date]`.
pub fn validate_universe(
    data_port: &dyn DataPort,
    codes: Vec<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    minimum: usize,
) -> Result<UniverseValidationResult, CombitraderError> {
    let mut valid_codes = Vec::new();
    let mut skipped = Vec::new();

    for code in codes {
        let series = match data_port.load_series(&code, end_date) {
            Ok(series) => series,
            Err(e) => {
                warn!(code = %code, error = %e, "skipping code");
                skipped.push(SkippedCode {
                    code,
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if series.split(start_date, end_date).is_empty() {
            warn!(code = %code, "skipping code, no bars in range");
            skipped.push(SkippedCode {
                code,
                reason: SkipReason::NoBarsInRange,
            });
            continue;
        }

        let bars = series.bar_count();
        if bars < minimum {
            warn!(code = %code, bars, minimum, "skipping code, insufficient bars");
            skipped.push(SkippedCode {
                code,
                reason: SkipReason::InsufficientBars { bars },
            });
            continue;
        }

        info!(code = %code, bars, "ok");
        valid_codes.push(code);
    }

    if valid_codes.is_empty() {
        return Err(CombitraderError::InsufficientData {
            code: "all".to_string(),
            bars: 0,
            minimum,
        });
    }

    Ok(UniverseValidationResult {
        universe: Universe { codes: valid_codes },
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::series::Series;

    #[test]
    fn test_parse_codes_basic() {
        let result = parse_codes("7203,6758,9984").unwrap();
        assert_eq!(result, vec!["7203", "6758", "9984"]);
    }

    #[test]
    fn test_parse_codes_with_whitespace() {
        let result = parse_codes("  7203 , 6758 ,9984  ").unwrap();
        assert_eq!(result, vec!["7203", "6758", "9984"]);
    }

    #[test]
    fn test_parse_codes_uppercase() {
        let result = parse_codes("n225,topix").unwrap();
        assert_eq!(result, vec!["N225", "TOPIX"]);
    }

    #[test]
    fn test_parse_codes_empty_token() {
        let result = parse_codes("7203,,6758");
        assert!(matches!(result, Err(UniverseError::EmptyToken)));
    }

    #[test]
    fn test_parse_codes_duplicate() {
        let result = parse_codes("7203,6758,7203");
        assert!(matches!(result, Err(UniverseError::DuplicateCode(s)) if s == "7203"));
    }

    struct TwoBars;

    impl DataPort for TwoBars {
        fn load_series(&self, code: &str, _end: NaiveDate) -> Result<Series, CombitraderError> {
            if code == "MISSING" {
                return Err(CombitraderError::NoData {
                    code: code.into(),
                    reason: "not found".into(),
                });
            }
            let bars = (1..=2)
                .map(|day| OhlcvBar {
                    date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1,
                })
                .collect();
            Ok(Series::new(code, bars))
        }

        fn list_codes(&self) -> Result<Vec<String>, CombitraderError> {
            Ok(vec![])
        }
    }

    #[test]
    fn validate_skips_missing_and_short() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let result = validate_universe(
            &TwoBars,
            vec!["7203".into(), "MISSING".into()],
            d(1),
            d(5),
            2,
        )
        .unwrap();
        assert_eq!(result.universe.codes, vec!["7203"]);
        assert_eq!(result.skipped[0].reason, SkipReason::NoData);

        let err = validate_universe(&TwoBars, vec!["7203".into()], d(1), d(5), 3).unwrap_err();
        assert!(matches!(err, CombitraderError::InsufficientData { minimum: 3, .. }));

        let err = validate_universe(&TwoBars, vec!["7203".into()], d(3), d(5), 1).unwrap_err();
        assert!(matches!(err, CombitraderError::InsufficientData { .. }));
    }
}
