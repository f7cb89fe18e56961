//! Estimated completion dates.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::config::ProcessingTimes;
use crate::error::{ConfigError, Result};
use crate::order::ProcessType;

/// Estimated completion date for an order placed on `today`.
///
/// The configured processing hours are rounded up to whole days and added to
/// `today`. A result falling on Saturday or Sunday moves to the next Monday.
/// A date past the calendar range is a configuration error.
pub fn estimate_completion(
    process_type: ProcessType,
    today: NaiveDate,
    processing_times: &ProcessingTimes,
) -> Result<NaiveDate> {
    let hours = processing_times.hours_for(process_type);
    let days = hours.div_ceil(24);
    let out_of_range = || ConfigError::Validation {
        message: format!(
            "processingTimes.{} = {} puts the estimate out of range",
            process_type, hours
        ),
    };

    let mut date = today
        .checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(out_of_range)?;
    while is_weekend(date) {
        date = date.succ_opt().ok_or_else(out_of_range)?;
    }
    Ok(date)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
