use chrono::{DateTime, Datelike, Days, Duration, NaiveDateTime, NaiveTime, TimeZone};

/// Midnight of the calendar day containing `dt`.
pub fn start_of_day(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date().and_time(NaiveTime::MIN)
}

/// Midnight of the first calendar day of the month containing `dt`.
pub fn start_of_month(dt: NaiveDateTime) -> NaiveDateTime {
    let first = dt.date() - Days::new(u64::from(dt.day0()));
    first.and_time(NaiveTime::MIN)
}

/// Midnight one calendar day before `day_start`.
pub fn previous_day_start(day_start: NaiveDateTime) -> NaiveDateTime {
    start_of_day(day_start) - Days::new(1)
}

/// Calendar-date equality (year, month, day), not a rolling 24h window.
pub fn is_same_day(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.date() == b.date()
}

/// Wall-clock time of `dt` as seen in `tz`.
pub fn local_wall_clock<Tz: TimeZone, Src: TimeZone>(
    dt: &DateTime<Src>,
    tz: &Tz,
) -> NaiveDateTime {
    dt.with_timezone(tz).naive_local()
}

/// Attach `tz` to a naive wall-clock time.
///
/// Ambiguous times (DST fall-back) pick the earlier instant. Times that fall in a
/// DST gap move forward past the gap, so 02:30 in a 02:00-03:00 gap becomes 03:30.
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt;
    }
    (1..=3)
        .find_map(|h| tz.from_local_datetime(&(naive + Duration::hours(h))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}
