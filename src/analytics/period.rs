// src/analytics/period.rs
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{AnalyticsError, Result};
use crate::store::Filter;

/// Query parameters shared by every dashboard read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub limit: Option<usize>,
    pub prioritize_flagged: Option<bool>,
}

/// Inclusive UTC interval over audit creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

fn day_end(day: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&day.and_time(last))
}

impl TimeRange {
    pub fn for_year(year: i32) -> Result<Self> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1);
        let last = NaiveDate::from_ymd_opt(year, 12, 31);
        match (first, last) {
            (Some(first), Some(last)) => Ok(Self {
                start: day_start(first),
                end: day_end(last),
            }),
            _ => Err(AnalyticsError::bad_parameter("year", format!("{} is out of range", year))),
        }
    }

    pub fn for_days(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(AnalyticsError::bad_parameter(
                "startDate",
                "startDate must not be after endDate",
            ));
        }
        Ok(Self {
            start: day_start(start),
            end: day_end(end),
        })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }

    pub fn filter(&self, field: &str) -> Filter {
        Filter::new()
            .op(field, "$gte", self.start.to_rfc3339_opts(SecondsFormat::Millis, true))
            .op(field, "$lte", self.end.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl DashboardFilters {
    /// Explicit date pair first, then `year`, then the calendar year of `now`.
    pub fn time_range(&self, now: DateTime<Utc>) -> Result<TimeRange> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => TimeRange::for_days(start, end),
            _ => TimeRange::for_year(self.year.unwrap_or_else(|| now.year())),
        }
    }

    /// Year whose monthly trend is reported.
    pub fn trend_year(&self, now: DateTime<Utc>) -> Result<i32> {
        match self.year {
            Some(year) => Ok(year),
            None => Ok(self.time_range(now)?.year()),
        }
    }
}
