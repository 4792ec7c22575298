//! Tick timestamps and snapshot names
//!
//! All recorded times are "ticks": 100-nanosecond intervals since
//! 0001-01-01T00:00:00 UTC. Snapshot files are named after their tick
//! timestamp as `YYYYMMDD_HHMMSS_fffffff`, so lexicographic order of
//! snapshot names equals chronological order.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Ticks per second (100-ns resolution).
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Tick value of the Unix epoch (1970-01-01T00:00:00Z).
pub const UNIX_EPOCH_TICKS: u64 = 621_355_968_000_000_000;

/// Current UTC time in ticks.
pub fn ticks_now() -> u64 {
    system_time_to_ticks(SystemTime::now())
}

/// Convert a [`SystemTime`] to ticks. Times before year 1 clamp to zero.
pub fn system_time_to_ticks(time: SystemTime) -> u64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => {
            UNIX_EPOCH_TICKS + after.as_secs() * TICKS_PER_SECOND + after.subsec_nanos() as u64 / 100
        }
        Err(err) => {
            let before = err.duration();
            let ticks = before.as_secs() * TICKS_PER_SECOND + before.subsec_nanos() as u64 / 100;
            UNIX_EPOCH_TICKS.saturating_sub(ticks)
        }
    }
}

/// Convert ticks back to a [`SystemTime`].
pub fn ticks_to_system_time(ticks: u64) -> SystemTime {
    let duration = std::time::Duration::new(
        ticks.abs_diff(UNIX_EPOCH_TICKS) / TICKS_PER_SECOND,
        (ticks.abs_diff(UNIX_EPOCH_TICKS) % TICKS_PER_SECOND * 100) as u32,
    );
    if ticks >= UNIX_EPOCH_TICKS {
        UNIX_EPOCH + duration
    } else {
        UNIX_EPOCH - duration
    }
}

fn ticks_to_datetime(ticks: u64) -> DateTime<Utc> {
    let rel = ticks as i64 - UNIX_EPOCH_TICKS as i64;
    let secs = rel.div_euclid(TICKS_PER_SECOND as i64);
    let nanos = rel.rem_euclid(TICKS_PER_SECOND as i64) as u32 * 100;
    // u64 ticks top out near year 58,000, far inside chrono's range.
    Utc.timestamp_opt(secs, nanos).unwrap()
}

/// Snapshot file stem for a tick timestamp: `YYYYMMDD_HHMMSS_fffffff`.
pub fn snapshot_name(ticks: u64) -> String {
    let dt = ticks_to_datetime(ticks);
    format!(
        "{}_{:07}",
        dt.format("%Y%m%d_%H%M%S"),
        ticks % TICKS_PER_SECOND
    )
}

/// Parse a snapshot file stem back into its tick timestamp.
pub fn parse_snapshot_name(name: &str) -> Result<u64> {
    let (stamp, fraction) = name
        .rsplit_once('_')
        .with_context(|| format!("malformed snapshot name: {}", name))?;
    let fraction: u64 = fraction
        .parse()
        .ok()
        .filter(|_| fraction.len() == 7)
        .with_context(|| format!("malformed snapshot fraction: {}", name))?;
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S")
        .with_context(|| format!("malformed snapshot timestamp: {}", name))?;
    let secs = naive.and_utc().timestamp();
    let base = UNIX_EPOCH_TICKS as i64 + secs * TICKS_PER_SECOND as i64;
    Ok(base as u64 + fraction)
}

/// Human-readable UTC rendering for listings.
pub fn format_ticks(ticks: u64) -> String {
    ticks_to_datetime(ticks)
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}
