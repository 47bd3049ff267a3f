use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};

use crate::model::Window;

/// The full calendar day before `now`, in `now`'s time zone.
///
/// `end` is local midnight of `now`'s date and `start` is exactly 24 hours
/// earlier. On a day whose midnight falls in a DST gap, `end` is the first
/// valid local instant after midnight.
pub fn daily_window<Tz: TimeZone>(now: &DateTime<Tz>) -> Window {
    let tz = now.timezone();
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN);
    let end = resolve_local(&tz, midnight).with_timezone(&Utc);
    Window {
        start: end - Duration::hours(24),
        end,
    }
}

/// The local instant for `local`, moving past a DST gap and taking the
/// earlier instant on an overlap.
pub(crate) fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = local;
    // Gaps are at most a few hours; step forward until the local time exists.
    for _ in 0..24 * 4 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => candidate += Duration::minutes(15),
        }
    }
    tz.from_utc_datetime(&local)
}
