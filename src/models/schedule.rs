use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub partner_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_available: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Schedule {
    pub fn duration_hours(&self) -> f64 {
        (self.end_time - self.start_time).num_minutes() as f64 / 60.0
    }

    pub fn same_window(&self, start: &NaiveDateTime, end: &NaiveDateTime) -> bool {
        self.start_time == *start && self.end_time == *end
    }
}

/// Raw schedule fields as submitted by a partner. Every field is optional so
/// batch requests can carry incomplete rows, which are filtered out.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl ScheduleInput {
    pub fn new(date: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        [&self.date, &self.start_time, &self.end_time]
            .iter()
            .all(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Parses into `(date, start, end)`; `None` if any part is missing or unparseable.
    pub fn parse(&self) -> Option<(NaiveDate, NaiveDateTime, NaiveDateTime)> {
        let date = parse_date(self.date.as_deref()?)?;
        let start = parse_datetime(self.start_time.as_deref()?)?;
        let end = parse_datetime(self.end_time.as_deref()?)?;
        Some((date, start, end))
    }
}

/// Accepts RFC 3339 (normalised to UTC) and the common naive layouts.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, super::DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}
