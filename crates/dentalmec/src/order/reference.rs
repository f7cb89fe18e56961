//! Per-day sequential order references (`YYYYMMDD-NNNN`).
//!
//! The next sequence is derived from the greatest reference already stored
//! for the day. Two writers can still compute the same candidate, so the
//! UNIQUE index on `orders.reference_number` decides: a writer whose insert
//! is rejected recomputes and retries a bounded number of times.

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::db::{order_repo, DatabaseError};
use crate::error::PortalError;

/// Highest sequence representable in four digits.
pub const MAX_DAILY_SEQUENCE: u32 = 9999;

/// `YYYYMMDD` prefix shared by every reference of `day`.
pub fn day_prefix(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

pub fn format_reference(day: NaiveDate, sequence: u32) -> String {
    format!("{}-{:04}", day_prefix(day), sequence)
}

/// Numeric suffix of a reference for `day`, if it is well formed.
pub fn parse_sequence(reference: &str, day: NaiveDate) -> Option<u32> {
    let suffix = reference.strip_prefix(&day_prefix(day))?.strip_prefix('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Sequence the next order of `day` should get.
///
/// One past the greatest stored suffix; 1 when the day has no orders or the
/// greatest reference is malformed.
pub fn next_sequence(conn: &Connection, day: NaiveDate) -> Result<u32, DatabaseError> {
    let prefix = format!("{}-", day_prefix(day));
    let max = order_repo::max_reference_with_prefix(conn, &prefix)?;
    Ok(max
        .and_then(|reference| parse_sequence(&reference, day))
        .map_or(1, |sequence| sequence.saturating_add(1)))
}

/// Allocates a reference for `day` and runs `insert` with it.
///
/// `insert` must fail with a unique violation when the reference is already
/// taken. On such a failure the candidate is recomputed as
/// `max(next_sequence, previous + 1)` and tried again, up to `max_attempts`
/// times. Returns the reference that was accepted and the value of `insert`.
pub fn allocate<T, F>(
    conn: &Connection,
    day: NaiveDate,
    max_attempts: u32,
    mut insert: F,
) -> Result<(String, T), PortalError>
where
    F: FnMut(&Connection, &str) -> Result<T, DatabaseError>,
{
    let mut previous: Option<u32> = None;

    for attempt in 1..=max_attempts {
        let mut sequence = next_sequence(conn, day)?;
        if let Some(previous) = previous {
            sequence = sequence.max(previous + 1);
        }
        if sequence > MAX_DAILY_SEQUENCE {
            return Err(PortalError::Conflict(format!(
                "daily reference capacity exhausted for {}",
                day_prefix(day)
            )));
        }

        let reference = format_reference(day, sequence);
        match insert(conn, &reference) {
            Ok(value) => {
                debug!(reference = %reference, attempt, "Reference allocated");
                return Ok((reference, value));
            }
            Err(e) if e.is_unique_violation() => {
                warn!(reference = %reference, attempt, "Reference already taken, retrying");
                previous = Some(sequence);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(PortalError::Conflict(format!(
        "no free reference for {} after {} attempts",
        day_prefix(day),
        max_attempts
    )))
}
