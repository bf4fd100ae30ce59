//! Domain constants shared across crates.

/// Drift beyond this re-anchors the recurring cycle (time-shift).
pub const TIME_SHIFT_THRESHOLD_MINUTES: i64 = 15;

/// Default lead time between an alert and its dose.
pub const DEFAULT_ADVANCE_MINUTES: i64 = 15;

/// Fixed interval of the foreground due-check loop.
pub const DEFAULT_DUE_CHECK_INTERVAL_SECS: u64 = 15;

/// Due-check window: up to one minute overdue counts as due.
pub const DUE_WINDOW_LATE_SECS: i64 = 60;

/// Due-check window: up to five minutes early counts as due.
pub const DUE_WINDOW_EARLY_SECS: i64 = 300;

/// Narrow band around "now" that actually triggers a foreground alert,
/// so the loop does not re-fire on every tick inside the window.
pub const DUE_TRIGGER_BAND_SECS: i64 = 15;

/// Horizon of the calendar export.
pub const CALENDAR_EXPORT_DAYS: i64 = 14;

/// Length of an exported calendar event.
pub const CALENDAR_EVENT_MINUTES: i64 = 30;

/// History rows are editable for this long after the reported dose time.
pub const HISTORY_EDIT_WINDOW_HOURS: i64 = 24;
