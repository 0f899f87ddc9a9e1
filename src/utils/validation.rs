//! Validation utilities
//!
//! Domain checks shared by command DTO validation and transition guards:
//! stay-date ordering and reason-length rules.

use chrono::NaiveDate;

use crate::error::{EngineError, EngineResult};

/// Longest bookable stay, nights
const MAX_STAY_NIGHTS: i64 = 90;

/// Validate a stay interval: half-open, in the future, bounded length.
pub fn validate_stay_dates(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
) -> EngineResult<()> {
    if check_in < today {
        return Err(EngineError::Validation(
            "check-in date cannot be in the past".to_string(),
        ));
    }
    if check_out <= check_in {
        return Err(EngineError::Validation(
            "check-out date must be after check-in date".to_string(),
        ));
    }
    let nights = (check_out - check_in).num_days();
    if nights > MAX_STAY_NIGHTS {
        return Err(EngineError::Validation(format!(
            "stay of {} nights exceeds the {}-night maximum",
            nights, MAX_STAY_NIGHTS
        )));
    }
    Ok(())
}

/// Validate a free-text reason against a minimum length (whitespace
/// trimmed).
pub fn validate_reason(reason: Option<&str>, min_len: usize) -> EngineResult<()> {
    let trimmed = reason.unwrap_or("").trim();
    if trimmed.len() < min_len {
        return Err(EngineError::Validation(format!(
            "reason must be at least {} characters",
            min_len
        )));
    }
    Ok(())
}
