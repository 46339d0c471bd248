//! Subject selection port: which instruments a strategy watches on a date.

use crate::domain::error::CombitraderError;
use chrono::NaiveDate;

pub trait SubjectPort {
    fn subject(&self, date: NaiveDate) -> Result<Vec<String>, CombitraderError>;
}
