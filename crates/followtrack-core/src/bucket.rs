//! Bucket dates in the tracker's reference time zone.

use crate::{Result, TrackerError};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Zone the original deployment bucketed its history in.
pub const DEFAULT_TIME_ZONE: &str = "America/Mexico_City";

/// Calendar date of `at` as seen in `zone`.
pub fn bucket_date(at: DateTime<Utc>, zone: Tz) -> NaiveDate {
    at.with_timezone(&zone).date_naive()
}

/// Parse an IANA zone name such as `America/Mexico_City`.
pub fn parse_time_zone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TrackerError::Configuration(format!("unknown time zone: {:?}", name)))
}
