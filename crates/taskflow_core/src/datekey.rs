use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseDateError {
    #[error("invalid calendar date: {0}")]
    InvalidDate(String),
    #[error("invalid time of day: {0}")]
    InvalidTime(String),
}

/// A calendar day in the local timeline. Canonical text form is `YYYY-MM-DD`
/// and every comparison works on calendar fields, never on epoch offsets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Sunday-based column index, 0 through 6.
    pub fn weekday_index(&self) -> u8 {
        self.0.weekday().num_days_from_sunday() as u8
    }

    pub fn add_days(self, days: i64) -> Option<Self> {
        Duration::try_days(days)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map(Self)
    }

    /// Steps forward by whole months. When the source day does not exist in
    /// the target month the day is clamped to that month's last valid day,
    /// never rolled into the month after (Jan 31 + 1 month = Feb 28/29).
    pub fn add_months(self, months: u32) -> Option<Self> {
        let total = (self.year() as i64) * 12 + (self.month() as i64 - 1) + months as i64;
        let target_year = i32::try_from(total.div_euclid(12)).ok()?;
        let target_month = total.rem_euclid(12) as u32 + 1;
        let day = self.day().min(days_in_month(target_year, target_month));
        NaiveDate::from_ymd_opt(target_year, target_month, day).map(Self)
    }

    /// Steps forward by whole years, clamping Feb 29 to Feb 28 when the
    /// target year is not a leap year.
    pub fn add_years(self, years: u32) -> Option<Self> {
        let target_year = self.year().checked_add(i32::try_from(years).ok()?)?;
        let day = self.day().min(days_in_month(target_year, self.month()));
        NaiveDate::from_ymd_opt(target_year, self.month(), day).map(Self)
    }

    pub fn first_of_month(self) -> Self {
        self.0.with_day(1).map(Self).unwrap_or(self)
    }

    pub fn with_day(self, day: u32) -> Option<Self> {
        self.0.with_day(day).map(Self)
    }

    /// Signed whole-day distance from `self` to `other`.
    pub fn days_until(self, other: DateKey) -> i64 {
        other.0.signed_duration_since(self.0).num_days()
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = ParseDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| ParseDateError::InvalidDate(s.to_string()))
    }
}

/// A stored date literal: a calendar day plus an optional wall-clock time.
/// Scheduling math only ever looks at the day; the time rides along for
/// display. Ordering matches lexicographic ordering of the text form, so an
/// untimed literal sorts ahead of any timed literal on the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateValue {
    pub date: DateKey,
    pub time: Option<NaiveTime>,
}

impl DateValue {
    pub fn date_only(date: DateKey) -> Self {
        Self { date, time: None }
    }

    pub fn at(date: DateKey, time: NaiveTime) -> Self {
        Self {
            date,
            time: Some(time),
        }
    }
}

impl From<DateKey> for DateValue {
    fn from(date: DateKey) -> Self {
        Self::date_only(date)
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time {
            Some(time) => write!(f, "{}T{}", self.date, time.format("%H:%M:%S")),
            None => write!(f, "{}", self.date),
        }
    }
}

impl FromStr for DateValue {
    type Err = ParseDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((date_part, time_part)) = s.split_once('T') else {
            return Ok(Self::date_only(s.parse()?));
        };
        let date: DateKey = date_part.parse()?;
        let time = NaiveTime::parse_from_str(time_part, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(time_part, "%H:%M"))
            .map_err(|_| ParseDateError::InvalidTime(time_part.to_string()))?;
        Ok(Self::at(date, time))
    }
}

impl Serialize for DateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> DateKey {
        s.parse().expect("valid date key")
    }

    #[test]
    fn date_key_round_trips_through_text() {
        let parsed = key("2024-01-15");
        assert_eq!(parsed, DateKey::from_ymd(2024, 1, 15).unwrap());
        assert_eq!(parsed.to_string(), "2024-01-15");
    }

    #[test]
    fn date_key_rejects_malformed_text() {
        assert!("2024-13-01".parse::<DateKey>().is_err());
        assert!("2023-02-29".parse::<DateKey>().is_err());
        assert!("15/01/2024".parse::<DateKey>().is_err());
        assert!("tomorrow".parse::<DateKey>().is_err());
    }

    #[test]
    fn month_stepping_clamps_to_month_end() {
        assert_eq!(key("2025-01-31").add_months(1), Some(key("2025-02-28")));
        assert_eq!(key("2024-01-31").add_months(1), Some(key("2024-02-29")));
        assert_eq!(key("2025-03-31").add_months(1), Some(key("2025-04-30")));
        assert_eq!(key("2025-11-15").add_months(2), Some(key("2026-01-15")));
    }

    #[test]
    fn year_stepping_clamps_leap_day() {
        assert_eq!(key("2024-02-29").add_years(1), Some(key("2025-02-28")));
        assert_eq!(key("2024-02-29").add_years(4), Some(key("2028-02-29")));
    }

    #[test]
    fn day_stepping_is_checked() {
        assert_eq!(key("2024-12-31").add_days(1), Some(key("2025-01-01")));
        assert_eq!(key("2024-03-01").add_days(-1), Some(key("2024-02-29")));
        assert!(key("2024-01-01").add_days(i64::MAX).is_none());
    }

    #[test]
    fn weekday_index_is_sunday_based() {
        assert_eq!(key("2024-01-14").weekday_index(), 0);
        assert_eq!(key("2024-01-15").weekday_index(), 1);
        assert_eq!(key("2024-01-20").weekday_index(), 6);
    }

    #[test]
    fn date_value_parses_all_stored_forms() {
        let plain: DateValue = "2024-01-15".parse().expect("date only");
        assert_eq!(plain.date, key("2024-01-15"));
        assert!(plain.time.is_none());

        let minutes: DateValue = "2024-01-15T09:30".parse().expect("minutes");
        assert_eq!(minutes.time, NaiveTime::from_hms_opt(9, 30, 0));

        let seconds: DateValue = "2024-01-15T09:30:15".parse().expect("seconds");
        assert_eq!(seconds.time, NaiveTime::from_hms_opt(9, 30, 15));
        assert_eq!(seconds.to_string(), "2024-01-15T09:30:15");

        assert!("2024-01-15T25:00".parse::<DateValue>().is_err());
    }

    #[test]
    fn date_value_orders_like_its_text_form() {
        let untimed: DateValue = "2024-01-15".parse().unwrap();
        let morning: DateValue = "2024-01-15T08:00".parse().unwrap();
        let evening: DateValue = "2024-01-15T20:00".parse().unwrap();
        let next_day: DateValue = "2024-01-16".parse().unwrap();
        assert!(untimed < morning);
        assert!(morning < evening);
        assert!(evening < next_day);
    }

    #[test]
    fn serde_uses_the_canonical_strings() {
        let value: DateValue = "2024-01-15T09:00".parse().unwrap();
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"2024-01-15T09:00:00\"");
        let back: DateValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);

        let key_json = serde_json::to_string(&key("2024-01-15")).unwrap();
        assert_eq!(key_json, "\"2024-01-15\"");
    }
}
