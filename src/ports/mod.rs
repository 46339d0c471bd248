//! Port traits for the collaborators the domain drives.

pub mod cache_port;
pub mod config_port;
pub mod data_port;
pub mod subject_port;
pub mod trade_log_port;
