//! Repository layer: entity-scoped database operations.
//!
//! Free functions over `&Connection`; callers own transaction boundaries.

mod assignment;
mod category;
mod document;
mod feature;

use chrono::{NaiveDate, NaiveDateTime};

use super::DatabaseError;

pub use assignment::*;
pub use category::*;
pub use document::*;
pub use feature::*;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current time as stored: naive UTC. Every persisted timestamp uses this base.
pub fn utc_now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| DatabaseError::InvalidTimestamp(raw.to_string()))
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| DatabaseError::InvalidTimestamp(raw.to_string()))
}
