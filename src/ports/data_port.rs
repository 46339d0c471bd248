//! Market data access port trait.

use crate::domain::error::CombitraderError;
use crate::domain::series::Series;
use chrono::NaiveDate;

pub trait DataPort {
    /// All bars of `code` dated on or before `end`, with their indicator columns.
    fn load_series(&self, code: &str, end: NaiveDate) -> Result<Series, CombitraderError>;

    fn list_codes(&self) -> Result<Vec<String>, CombitraderError>;
}
