//! Per-cycle summaries for the log and for machine consumers

use crate::output::stats::MissingSummary;
use crate::state::RunResult;
use serde::Serialize;

#[derive(Serialize)]
struct CycleLine<'a> {
    #[serde(flatten)]
    result: &'a RunResult,
    missing: &'a MissingSummary,
}

/// One-line human summary of a finished cycle
pub fn format_cycle_summary(result: &RunResult, missing: &MissingSummary) -> String {
    let reason = result
        .completion_reason
        .map(|r| r.as_str())
        .unwrap_or("unknown");

    let mut line = format!(
        "artists +{} ~{} (dup {}, done {}) | albums +{} ~{} ={} | tracks +{} ={} !{} | \
         missing artists={} albums={} | {}",
        result.artists_created,
        result.artists_updated,
        result.artists_skipped,
        result.artists_fully_hydrated_skipped,
        result.albums_created,
        result.albums_updated,
        result.albums_skipped,
        result.tracks_created,
        result.tracks_skipped,
        result.tracks_failed,
        missing.artists_not_fully_hydrated,
        missing.albums_not_fully_hydrated,
        reason,
    );

    if !result.failed_artist_ids.is_empty() {
        line.push_str(&format!(
            " | failed artists: {}",
            result.failed_artist_ids.join(",")
        ));
    }
    if result.cancelled {
        line.push_str(" | cancelled");
    }
    line
}

/// The cycle result and missing summary as a single JSON object
pub fn cycle_json_line(
    result: &RunResult,
    missing: &MissingSummary,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&CycleLine { result, missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CompletionReason, EntityStatus};

    fn sample() -> (RunResult, MissingSummary) {
        let mut result = RunResult::new();
        result.record_artist(EntityStatus::Created);
        result.record_album(EntityStatus::Created);
        result.record_track(EntityStatus::Created);
        result.record_track(EntityStatus::Created);
        result.record_failed_artist("a9");
        result.finish(CompletionReason::ArtistsNotHydrated);

        let missing = MissingSummary {
            artists_not_fully_hydrated: 1,
            albums_not_fully_hydrated: 0,
        };
        (result, missing)
    }

    #[test]
    fn test_format_cycle_summary() {
        let (result, missing) = sample();
        let line = format_cycle_summary(&result, &missing);

        assert!(line.starts_with("artists +1 ~0"));
        assert!(line.contains("tracks +2 =0 !0"));
        assert!(line.contains("missing artists=1 albums=0"));
        assert!(line.contains("artists_not_hydrated"));
        assert!(line.ends_with("failed artists: a9"));
    }

    #[test]
    fn test_cycle_json_line() {
        let (result, missing) = sample();
        let json = cycle_json_line(&result, &missing).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["artists_created"], 1);
        assert_eq!(value["tracks_created"], 2);
        assert_eq!(value["completed"], false);
        assert_eq!(value["completion_reason"], "artists_not_hydrated");
        assert_eq!(value["failed_artist_ids"][0], "a9");
        assert_eq!(value["missing"]["artists_not_fully_hydrated"], 1);
    }
}
