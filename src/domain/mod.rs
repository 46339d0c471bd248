//! Core domain types and logic.

pub mod backtest;
pub mod catalog;
pub mod combination;
pub mod condition;
pub mod condition_eval;
pub mod condition_parser;
pub mod config_validation;
pub mod context;
pub mod corporate;
pub mod error;
pub mod genome;
pub mod ohlcv;
pub mod position;
pub mod rule_engine;
pub mod selection;
pub mod series;
pub mod simulator;
pub mod statistics;
pub mod strategy;
pub mod trade_recorder;
pub mod universe;
