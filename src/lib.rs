//! RSS Aggregator - background feed refresh pipeline
//!
//! Periodically selects the feeds that are most overdue, downloads and
//! parses them with bounded concurrency, and stores each new item exactly
//! once per feed.

pub mod config;
pub mod db;
pub mod fetcher;
pub mod parser;
pub mod refresh;
pub mod scheduler;
pub mod store;
