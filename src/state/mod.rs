//! State module for reporting crawl progress
//!
//! # Components
//!
//! - `EntityStatus`: Outcome of processing a single artist, album or track
//! - `CompletionReason`: Why a cycle did or did not finish the catalog
//! - `RunResult`: Counters and completion status for one cycle

mod entity_status;
mod run_result;

// Re-export main types
pub use entity_status::{CompletionReason, EntityStatus};
pub use run_result::RunResult;
