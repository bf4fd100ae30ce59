//! Dose-cycle math.
//!
//! Pure functions over UTC instants. The whole scheduling engine leans
//! on three rules:
//!
//! - a *take* re-plans from the actual intake time,
//! - a *skip* forfeits the slot and keeps the original phase,
//! - a missed alert never produces a backlog; the cycle is
//!   fast-forwarded by whole multiples of the frequency instead.

use chrono::{DateTime, Duration, Utc};
use dosetrack_domain::constants::{
    DUE_TRIGGER_BAND_SECS, DUE_WINDOW_EARLY_SECS, DUE_WINDOW_LATE_SECS,
};
use dosetrack_domain::exceeds_time_shift_threshold;

/// Next dose after a confirmed take: exactly `frequency_hours` after
/// the user-reported intake time, regardless of the original plan.
pub fn next_after_take(actual: DateTime<Utc>, frequency_hours: i64) -> DateTime<Utc> {
    actual + Duration::hours(frequency_hours)
}

/// Next dose after a skip: the slot is forfeited, the cycle keeps its
/// phase. The reported skip time is deliberately ignored.
pub fn next_after_skip(previous_next: DateTime<Utc>, frequency_hours: i64) -> DateTime<Utc> {
    previous_next + Duration::hours(frequency_hours)
}

/// Whether a take at `actual` drifted far enough from the plan to
/// re-anchor the whole cycle. Manual (non-recurring) treatments never
/// shift.
pub fn detect_time_shift(
    scheduled: DateTime<Utc>,
    actual: DateTime<Utc>,
    frequency_hours: i64,
) -> bool {
    frequency_hours > 0 && exceeds_time_shift_threshold(scheduled, actual)
}

/// Catch-up rule: advance `next` by whole multiples of the frequency
/// until it is strictly in the future. Identity for non-recurring
/// treatments and for instants already in the future.
pub fn fast_forward(
    next: DateTime<Utc>,
    frequency_hours: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if frequency_hours <= 0 || next > now {
        return next;
    }
    let step = Duration::hours(frequency_hours);
    let mut next = next;
    while next <= now {
        next += step;
    }
    next
}

/// Whether a dose at `scheduled` falls inside the due-check window at
/// `now`: up to one minute overdue or up to five minutes early.
pub fn in_due_window(scheduled: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let diff = scheduled - now;
    diff > -Duration::seconds(DUE_WINDOW_LATE_SECS)
        && diff < Duration::seconds(DUE_WINDOW_EARLY_SECS)
}

/// Narrow trigger band inside the window, so the loop fires once
/// rather than on every tick while the dose sits in the window.
pub fn in_trigger_band(scheduled: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (scheduled - now).abs() < Duration::seconds(DUE_TRIGGER_BAND_SECS)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).single().unwrap()
    }

    #[test]
    fn take_replans_from_actual_time() {
        // Dose planned for 08:00, taken at 10:30 with an 8h frequency:
        // the next dose is 18:30, not 16:00.
        assert_eq!(next_after_take(at(10, 30), 8), at(18, 30));
    }

    #[test]
    fn skip_keeps_the_original_phase() {
        assert_eq!(next_after_skip(at(8, 0), 8), at(16, 0));
    }

    #[test]
    fn time_shift_raised_only_beyond_threshold() {
        assert!(detect_time_shift(at(8, 0), at(10, 30), 8));
        assert!(!detect_time_shift(at(8, 0), at(8, 10), 8));
        // Manual treatments never re-anchor.
        assert!(!detect_time_shift(at(8, 0), at(10, 30), 0));
    }

    #[test]
    fn fast_forward_uses_whole_multiples() {
        // 08:00 with an 8h frequency, now 17:00 -> 00:00 next day.
        let next = fast_forward(at(8, 0), 8, at(17, 0));
        assert_eq!(next, at(8, 0) + Duration::hours(16));
        assert!(next > at(17, 0));
    }

    #[test]
    fn fast_forward_is_identity_for_future_instants() {
        assert_eq!(fast_forward(at(18, 0), 8, at(9, 0)), at(18, 0));
        assert_eq!(fast_forward(at(8, 0), 0, at(17, 0)), at(8, 0));
    }

    #[test]
    fn fast_forward_moves_exact_now_to_next_cycle() {
        assert_eq!(fast_forward(at(8, 0), 8, at(8, 0)), at(16, 0));
    }

    #[test]
    fn due_window_spans_minus_one_to_plus_five_minutes() {
        let now = at(8, 0);
        assert!(in_due_window(at(8, 4), now));
        assert!(in_due_window(at(7, 59), now));
        assert!(!in_due_window(at(8, 6), now));
        assert!(!in_due_window(at(7, 58), now));
    }

    #[test]
    fn trigger_band_is_fifteen_seconds() {
        let now = at(8, 0);
        assert!(in_trigger_band(at(8, 0), now));
        assert!(!in_trigger_band(at(8, 1), now));
    }
}
