use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

pub const SHORT_DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// One weekly recurring time-block for a class. `day_of_week` follows the
/// stored convention: 0 = Sunday .. 6 = Saturday. Times are validated at the
/// IPC boundary; this module assumes `start < end` and `day_of_week <= 6`.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub id: String,
    pub class_id: String,
    pub day_of_week: u8,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl ScheduleEntry {
    fn in_validity(&self, date: NaiveDate) -> bool {
        if let Some(from) = self.valid_from {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if date > to {
                return false;
            }
        }
        true
    }

    fn matches(&self, date: NaiveDate) -> bool {
        u32::from(self.day_of_week) == date.weekday().num_days_from_sunday()
            && self.in_validity(date)
    }
}

/// True iff the class meets on `date`: some entry's weekday matches and the
/// date falls within that entry's inclusive validity bounds. A class with no
/// entries never meets; marking against it is rejected upstream.
pub fn meets_on(schedules: &[ScheduleEntry], date: NaiveDate) -> bool {
    schedules.iter().any(|s| s.matches(date))
}

/// Next class start at or after `now`, scanning today plus the next six days
/// (exhaustive for a weekly pattern). On the current day only entries whose
/// start is strictly later than `now`'s time-of-day count; an already-started
/// session is not "next". Candidates outside their validity bounds on the
/// candidate date are skipped, so an expired entry is never reported.
pub fn next_occurrence(schedules: &[ScheduleEntry], now: NaiveDateTime) -> Option<NaiveDateTime> {
    if schedules.is_empty() {
        return None;
    }
    for offset in 0..7i64 {
        let date = now.date() + Duration::days(offset);
        let mut starts: Vec<NaiveTime> = schedules
            .iter()
            .filter(|s| s.matches(date))
            .filter(|s| offset > 0 || s.start > now.time())
            .map(|s| s.start)
            .collect();
        starts.sort();
        if let Some(start) = starts.first() {
            return Some(date.and_time(*start));
        }
    }
    None
}

/// Human-readable weekly summary: `"Mon 9:00 AM-10:00 AM, Wed 1:30 PM-2:30 PM"`.
pub fn format_summary(schedules: &[ScheduleEntry]) -> String {
    if schedules.is_empty() {
        return "No schedule set".to_string();
    }
    schedules
        .iter()
        .map(|s| {
            format!(
                "{} {}-{}",
                SHORT_DAYS[usize::from(s.day_of_week) % 7],
                format_time_of_day(s.start),
                format_time_of_day(s.end)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// 12-hour clock rendering of a time-of-day. Deliberately a pure formatter,
/// not a date construction, so no epoch or timezone artifacts leak in.
pub fn format_time_of_day(t: NaiveTime) -> String {
    let (is_pm, hour) = t.hour12();
    format!(
        "{}:{:02} {}",
        hour,
        t.minute(),
        if is_pm { "PM" } else { "AM" }
    )
}
