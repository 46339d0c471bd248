//! JSON genome files.

use crate::domain::error::CombitraderError;
use crate::domain::genome::GenomeRecord;
use std::fs;
use std::path::Path;

pub fn load_genome(path: &Path) -> Result<GenomeRecord, CombitraderError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_genome(path: &Path, record: &GenomeRecord) -> Result<(), CombitraderError> {
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json + "\n")?;
    Ok(())
}
