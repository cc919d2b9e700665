//! Repeated crawl cycles with idle backoff
//!
//! The driver runs [`Coordinator::run_cycle`] until the catalog is complete or
//! a shutdown is requested. After a cycle that made no progress the pause
//! before the next one grows geometrically up to a cap; any productive cycle
//! resets it.

use crate::config::DriverConfig;
use crate::crawler::Coordinator;
use crate::output::{cycle_json_line, format_cycle_summary, load_missing_summary, MissingSummary};
use crate::state::RunResult;
use crate::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How cycle summaries are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFormat {
    #[default]
    Text,
    /// One JSON object per cycle on stdout
    Json,
}

fn secs(value: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(fallback)
}

/// Pause after a productive cycle
pub fn base_sleep(config: &DriverConfig) -> Duration {
    secs(config.loop_sleep_secs, Duration::ZERO)
}

/// Pause to use after a cycle, given the pause used before it
pub fn next_sleep(config: &DriverConfig, current: Duration, idle: bool) -> Duration {
    if !idle {
        return base_sleep(config);
    }
    let max = secs(config.idle_max_sleep_secs, base_sleep(config));
    let grown = current.as_secs_f64() * config.idle_backoff_multiplier;
    secs(grown, max).min(max)
}

/// A cycle is idle when it created nothing, recorded no failures and left
/// the missing summary where the previous cycle left it
pub fn is_idle_cycle(
    result: &RunResult,
    previous: Option<&MissingSummary>,
    missing: &MissingSummary,
) -> bool {
    result.is_idle()
        && result.failed_artist_ids.is_empty()
        && result.failed_track_ids.is_empty()
        && previous == Some(missing)
}

/// Logs or prints the summary of a finished cycle
pub fn report_cycle(result: &RunResult, missing: &MissingSummary, format: SummaryFormat) {
    match format {
        SummaryFormat::Text => {
            tracing::info!("Cycle summary: {}", format_cycle_summary(result, missing));
        }
        SummaryFormat::Json => match cycle_json_line(result, missing) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::error!("Failed to serialise cycle summary: {}", e),
        },
    }
}

/// Runs one cycle and reports it
pub async fn run_once(coordinator: &mut Coordinator, format: SummaryFormat) -> Result<RunResult> {
    let result = coordinator.run_cycle().await?;
    let missing = load_missing_summary(coordinator.storage())?;
    report_cycle(&result, &missing, format);
    Ok(result)
}

/// Runs cycles until completion or cancellation, returning the last result
pub async fn run_loop(
    coordinator: &mut Coordinator,
    config: &DriverConfig,
    cancel: CancellationToken,
    format: SummaryFormat,
) -> Result<RunResult> {
    let mut sleep = base_sleep(config);
    let mut previous_missing: Option<MissingSummary> = None;
    let mut cycle: u64 = 0;

    loop {
        cycle += 1;
        tracing::info!("Starting cycle {}", cycle);

        let result = coordinator.run_cycle().await?;
        let missing = load_missing_summary(coordinator.storage())?;
        report_cycle(&result, &missing, format);

        if result.completed {
            tracing::info!("Catalog fully hydrated after {} cycles", cycle);
            return Ok(result);
        }
        if result.cancelled || cancel.is_cancelled() {
            tracing::info!("Shutdown requested; stopping after cycle {}", cycle);
            return Ok(result);
        }

        let idle = is_idle_cycle(&result, previous_missing.as_ref(), &missing);
        sleep = next_sleep(config, sleep, idle);
        previous_missing = Some(missing);

        tracing::info!(
            "Sleeping {:.0}s before next cycle{}",
            sleep.as_secs_f64(),
            if idle { " (idle)" } else { "" }
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Shutdown requested during sleep");
                return Ok(result);
            }
            _ = tokio::time::sleep(sleep) => {}
        }
    }
}
