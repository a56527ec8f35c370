//! Daylight-saving-time facts for the date library
//!
//! The Sputnik date tests expect the harness to declare when the host switches
//! into and out of DST. The switch points are found by bisecting over the
//! local clock rather than read from a tz database, so whatever the host's
//! `localtime` believes is what the tests see.

use chrono::{DateTime, Datelike, Offset, TimeZone, Timelike, Utc};
use std::fmt::Write as _;
use tracing::warn;

const ONE_MONTH: i64 = 30 * 24 * 60 * 60;

/// Broken-down local time of an instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFields {
    /// 1-based month
    pub month: u32,
    /// Day of month
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

/// Local-time primitives DST discovery is built on
pub trait LocalClock {
    /// Whether DST is in effect at the Unix timestamp `t`
    fn is_dst(&self, t: i64) -> bool;
    /// Local calendar fields at `t`
    fn local(&self, t: i64) -> LocalFields;
    /// Standard (non-DST) UTC offset in seconds, east positive
    fn standard_offset(&self) -> i32;
}

/// [`LocalClock`] over a chrono time zone
///
/// DST is taken to be in effect whenever the offset exceeds the smaller of the
/// January and July offsets of the reference year.
#[derive(Debug, Clone)]
pub struct ZoneClock<Tz: TimeZone> {
    zone: Tz,
    standard: i32,
}

impl<Tz: TimeZone> ZoneClock<Tz> {
    pub fn new(zone: Tz, reference: i64) -> Self {
        let year = Utc
            .timestamp_opt(reference, 0)
            .single()
            .map(|t| t.year())
            .unwrap_or(1970);
        let sample = |month: u32| {
            Utc.with_ymd_and_hms(year, month, 1, 12, 0, 0)
                .single()
                .map(|t| offset_at(&zone, t.timestamp()))
                .unwrap_or(0)
        };
        let standard = sample(1).min(sample(7));
        Self { zone, standard }
    }

    fn datetime(&self, t: i64) -> DateTime<Tz> {
        let utc = DateTime::<Utc>::from_timestamp(t, 0).unwrap_or_default();
        utc.with_timezone(&self.zone)
    }
}

impl ZoneClock<chrono::Local> {
    /// Clock for the host's local time zone
    pub fn host() -> Self {
        Self::new(chrono::Local, Utc::now().timestamp())
    }
}

fn offset_at<Tz: TimeZone>(zone: &Tz, t: i64) -> i32 {
    let utc = DateTime::<Utc>::from_timestamp(t, 0).unwrap_or_default();
    zone.offset_from_utc_datetime(&utc.naive_utc())
        .fix()
        .local_minus_utc()
}

impl<Tz: TimeZone> LocalClock for ZoneClock<Tz> {
    fn is_dst(&self, t: i64) -> bool {
        offset_at(&self.zone, t) > self.standard
    }

    fn local(&self, t: i64) -> LocalFields {
        let dt = self.datetime(t);
        LocalFields {
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
        }
    }

    fn standard_offset(&self) -> i32 {
        self.standard
    }
}

/// Whether the calendar's DST switch happens on a first or last Sunday
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SundayRule {
    First,
    Last,
}

impl SundayRule {
    fn as_js(self) -> &'static str {
        match self {
            SundayRule::First => "'first'",
            SundayRule::Last => "'last'",
        }
    }
}

/// Description of one DST transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// 0-based month, as JavaScript's `Date` counts them
    pub month: u32,
    pub hour: u32,
    pub minutes: u32,
    pub sunday: SundayRule,
}

impl Transition {
    fn at(clock: &impl LocalClock, t: i64) -> Self {
        let at = clock.local(t);
        let before = clock.local(t - 1);
        Self {
            month: at.month - 1,
            hour: before.hour + 1,
            minutes: (before.minute + 1) % 60,
            sunday: if at.day > 15 {
                SundayRule::Last
            } else {
                SundayRule::First
            },
        }
    }
}

/// DST schedule of the host around a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstSchedule {
    /// Switch into DST
    pub start: Transition,
    /// Switch out of DST
    pub end: Transition,
    /// Standard UTC offset in seconds
    pub standard_offset: i32,
}

impl DstSchedule {
    /// Discover the schedule around `now`, or `None` when the zone shows no DST
    pub fn discover(clock: &impl LocalClock, now: i64) -> Option<Self> {
        let (start, end) = transition_times(clock, now)?;
        Some(Self {
            start: Transition::at(clock, start),
            end: Transition::at(clock, end),
            standard_offset: clock.standard_offset(),
        })
    }

    /// JavaScript declarations for the date library, keys sorted
    pub fn declarations(&self) -> String {
        let attribs: [(&str, String); 8] = [
            ("end_hour", self.end.hour.to_string()),
            ("end_minutes", self.end.minutes.to_string()),
            ("end_month", self.end.month.to_string()),
            ("end_sunday", self.end.sunday.as_js().to_string()),
            ("start_hour", self.start.hour.to_string()),
            ("start_minutes", self.start.minutes.to_string()),
            ("start_month", self.start.month.to_string()),
            ("start_sunday", self.start.sunday.as_js().to_string()),
        ];

        let mut out = String::new();
        for (key, value) in attribs {
            let _ = writeln!(out, "var $DST_{} = {};", key, value);
        }
        let _ = writeln!(out, "var $LocalTZ = {};", self.standard_offset / 3600);
        out
    }
}

/// Declarations for the host clock, empty when DST cannot be determined
pub fn host_declarations() -> String {
    timezone_declarations(&ZoneClock::host(), Utc::now().timestamp())
}

/// Declarations for `clock` at `now`, empty when DST cannot be determined
pub fn timezone_declarations(clock: &impl LocalClock, now: i64) -> String {
    match DstSchedule::discover(clock, now) {
        Some(schedule) => schedule.declarations(),
        None => {
            warn!("unable to determine DST info");
            String::new()
        }
    }
}

/// Bisect until the window is at most `delta` seconds wide around the switch
fn find_between(clock: &impl LocalClock, mut start: i64, mut end: i64, delta: i64) -> i64 {
    let start_dst = clock.is_dst(start);
    while end - start > delta {
        let middle = start + (end - start) / 2;
        if clock.is_dst(middle) == start_dst {
            start = middle;
        } else {
            end = middle;
        }
    }
    start + (end - start) / 2
}

/// `(start, end)` timestamps of the DST period around `now`
fn transition_times(clock: &impl LocalClock, now: i64) -> Option<(i64, i64)> {
    let after = now + 4 * ONE_MONTH;
    let before = now - 4 * ONE_MONTH;
    let now_dst = clock.is_dst(now);
    if now_dst == clock.is_dst(before) && now_dst == clock.is_dst(after) {
        return None;
    }

    let first = if now_dst != clock.is_dst(before) {
        find_between(clock, before, now, 1)
    } else {
        find_between(clock, now, after, 1)
    };
    let second = find_between(clock, first + 3 * ONE_MONTH, first + 9 * ONE_MONTH, 1);

    if clock.is_dst(first - 1) && !clock.is_dst(first + 1) {
        Some((second, first))
    } else {
        Some((first, second))
    }
}
