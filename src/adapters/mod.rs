//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_portfolio_subjects;
pub mod csv_trade_log;
pub mod disk_cache;
pub mod file_config_adapter;
pub mod genome_file;
pub mod memory_cache;
