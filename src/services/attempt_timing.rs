use time::{Duration, PrimitiveDateTime};

pub(crate) fn attempt_deadline(
    start_time: PrimitiveDateTime,
    duration_minutes: i32,
) -> PrimitiveDateTime {
    start_time + Duration::minutes(i64::from(duration_minutes.max(0)))
}

pub(crate) fn seconds_left(
    start_time: PrimitiveDateTime,
    duration_minutes: i32,
    now: PrimitiveDateTime,
) -> i64 {
    let remaining = (attempt_deadline(start_time, duration_minutes) - now).whole_seconds();
    remaining.max(0)
}

/// Answer saves keep landing for `grace_seconds` past the deadline to absorb network
/// jitter around the client's forced submit.
pub(crate) fn accepts_answers(
    start_time: PrimitiveDateTime,
    duration_minutes: i32,
    now: PrimitiveDateTime,
    grace_seconds: u64,
) -> bool {
    let grace = Duration::seconds(i64::try_from(grace_seconds).unwrap_or(i64::MAX));
    attempt_deadline(start_time, duration_minutes)
        .checked_add(grace)
        .map_or(true, |limit| now <= limit)
}
