//! Date arithmetic shared by birthday, challenge and scheduling logic.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// True if `date` is a yearly anniversary of `origin` (never the origin day itself).
/// Origins on 29 February are celebrated on 28 February in non-leap years.
pub fn is_anniversary(origin: NaiveDate, date: NaiveDate) -> bool {
    if date.year() <= origin.year() {
        return false;
    }
    match NaiveDate::from_ymd_opt(date.year(), origin.month(), origin.day()) {
        Some(same_day) => same_day == date,
        None => date.month() == 2 && date.day() == 28,
    }
}

/// Most recent `weekday` on or before `today`.
pub fn last_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let back = (7 + today.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    today - Days::new(u64::from(back))
}

/// First `weekday` on or after `today`.
pub fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    today + Days::new(u64::from(ahead))
}
