use std::path::Path;

use chrono::{Duration, Local, NaiveDateTime, NaiveTime, TimeZone};
use roster_core::JsonFileSource;
use tracing::{info, warn};

use crate::commands::common::{format_run_lines, open_mirror, GlobalPaths};
use crate::commands::sync::sync_once;
use crate::error::CliError;

/// Run a scheduled sync every day at `at` (local time). Never returns on
/// success; a failed run is logged and the next day's run still happens.
pub async fn run_schedule(paths: &GlobalPaths, at: &str, input: &Path) -> Result<(), CliError> {
    let time_of_day = parse_time_of_day(at)?;
    let mirror = open_mirror(paths).await?;
    let source = JsonFileSource::new(input);

    loop {
        let now = Local::now();
        let next = next_run_after(now.naive_local(), time_of_day);
        let wait = local_instant(next)
            .ok_or_else(|| CliError::Schedule(now.to_rfc3339()))?
            .signed_duration_since(now)
            .to_std()
            .unwrap_or_default();
        info!(next_run = %next, "Waiting for next scheduled sync");
        tokio::time::sleep(wait).await;

        match sync_once(&mirror, &source, false).await {
            Ok(outcome) => {
                for line in format_run_lines(&outcome) {
                    println!("{line}");
                }
            }
            Err(error) => warn!(error = %error, "Scheduled sync failed"),
        }
    }
}

/// Accepts `HH:MM` or `HH:MM:SS`, 24-hour clock.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, CliError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| CliError::InvalidScheduleTime(raw.to_string()))
}

/// The first moment strictly after `now` whose time of day is `at`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Map a wall-clock time to an instant, skipping forward over DST gaps.
fn local_instant(naive: NaiveDateTime) -> Option<chrono::DateTime<Local>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}
