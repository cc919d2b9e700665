//! Output module for crawl summaries and catalog statistics
//!
//! This module handles:
//! - Summarising each crawl cycle as a log line or JSON object
//! - Counting catalog entities and what is still missing

pub mod stats;
mod summary;

pub use stats::{
    load_missing_summary, load_statistics, print_statistics, CatalogStatistics, MissingSummary,
};
pub use summary::{cycle_json_line, format_cycle_summary};
