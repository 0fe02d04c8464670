//! Schedule gate — recurring weekly windows during which relaying is permitted.
//!
//! A window is anchored on one weekday. When its end is not after its start,
//! the window runs past midnight into the following day.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};

/// Default windows: Wednesday and Thursday overnight, Sunday daytime.
pub const DEFAULT_SCHEDULE: &str = "2@19:00-07:30,3@19:00-07:30,6@07:00-19:30";

/// One recurring weekly window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ScheduleWindow {
    pub fn new(weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            weekday,
            start,
            end,
        }
    }

    /// Whether the window continues into the next day.
    pub fn spans_midnight(&self) -> bool {
        self.end <= self.start
    }

    /// Concrete start/end instants for the window opening on `date`.
    fn bounds_on(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = date.and_time(self.start);
        let mut end = date.and_time(self.end);
        if end <= start {
            end += TimeDelta::days(1);
        }
        (start, end)
    }

    fn contains(&self, opened_on: NaiveDate, now: NaiveDateTime) -> bool {
        let (start, end) = self.bounds_on(opened_on);
        start <= now && now <= end
    }
}

impl FromStr for ScheduleWindow {
    type Err = String;

    /// Parse `weekday@HH:MM-HH:MM`, weekday as 0-6 (Monday = 0) or a name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day, range) = s
            .trim()
            .split_once('@')
            .ok_or_else(|| format!("window '{s}' is missing '@'"))?;
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| format!("window '{s}' is missing '-'"))?;

        Ok(Self {
            weekday: parse_weekday(day.trim())?,
            start: parse_time(start.trim())?,
            end: parse_time(end.trim())?,
        })
    }
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    match s {
        "0" => Ok(Weekday::Mon),
        "1" => Ok(Weekday::Tue),
        "2" => Ok(Weekday::Wed),
        "3" => Ok(Weekday::Thu),
        "4" => Ok(Weekday::Fri),
        "5" => Ok(Weekday::Sat),
        "6" => Ok(Weekday::Sun),
        other => other
            .parse::<Weekday>()
            .map_err(|_| format!("unknown weekday '{other}'")),
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("invalid time '{s}': {e}"))
}

/// The set of windows the bridge operates in.
///
/// `windows == None` means the gate is always open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    windows: Option<Vec<ScheduleWindow>>,
}

impl Schedule {
    pub fn new(windows: Vec<ScheduleWindow>) -> Self {
        Self {
            windows: Some(windows),
        }
    }

    /// A schedule with no gating at all.
    pub fn always() -> Self {
        Self { windows: None }
    }

    /// False for the `always` schedule.
    pub fn is_gated(&self) -> bool {
        self.windows.is_some()
    }

    pub fn windows(&self) -> &[ScheduleWindow] {
        self.windows.as_deref().unwrap_or_default()
    }

    /// Whether relaying is permitted at `now`.
    ///
    /// Only the first window for a weekday counts. `now` is inside if it falls
    /// in today's window, or in the after-midnight tail of yesterday's window.
    /// That tail is open even when today has no window of its own, unlike a
    /// strict per-weekday lookup.
    pub fn in_window(&self, now: NaiveDateTime) -> bool {
        let Some(windows) = &self.windows else {
            return true;
        };

        let today = now.date();
        if let Some(window) = first_for(windows, now.weekday())
            && window.contains(today, now)
        {
            return true;
        }

        match (today.pred_opt(), first_for(windows, now.weekday().pred())) {
            (Some(yesterday), Some(window)) if window.spans_midnight() => {
                window.contains(yesterday, now)
            }
            _ => false,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        DEFAULT_SCHEDULE
            .parse()
            .unwrap_or_else(|_| Self::new(Vec::new()))
    }
}

impl FromStr for Schedule {
    type Err = String;

    /// Comma-separated windows, or `always`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("always") {
            return Ok(Self::always());
        }
        let windows = s
            .split(',')
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<ScheduleWindow>, _>>()?;
        Ok(Self::new(windows))
    }
}

fn first_for(windows: &[ScheduleWindow], weekday: Weekday) -> Option<&ScheduleWindow> {
    windows.iter().find(|w| w.weekday == weekday)
}
