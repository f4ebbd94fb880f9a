//! Date keys for the case table

use crate::config::DATE_FORMAT;
use chrono::NaiveDate;

/// Parse a user-supplied date and re-serialize it as a case table key
pub fn canonical_date(input: &str) -> Result<String, chrono::ParseError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map(|date| date.format(DATE_FORMAT).to_string())
}

/// Every date from `start` to `end` inclusive, as case table keys
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| day.format(DATE_FORMAT).to_string())
        .collect()
}
