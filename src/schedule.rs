use chrono::{DateTime, Duration, NaiveTime, TimeZone};

use crate::digest::window::resolve_local;

/// First instant strictly after `now` whose local wall-clock time is `at`.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = resolve_local(&tz, now.date_naive().and_time(at));
    if today > *now {
        return today;
    }
    let tomorrow = now.date_naive() + Duration::days(1);
    resolve_local(&tz, tomorrow.and_time(at))
}
