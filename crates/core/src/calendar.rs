//! Calendar (.ics) export.
//!
//! Purely derived presentation artifact: the next 14 days of dose
//! occurrences for the active treatments, one 30-minute `VEVENT` per
//! occurrence with a display alarm 5 minutes before it. No write-back,
//! no state.

use chrono::{DateTime, Duration, Utc};
use dosetrack_domain::constants::{CALENDAR_EVENT_MINUTES, CALENDAR_EXPORT_DAYS};
use dosetrack_domain::{Treatment, TreatmentKind};

const PRODID: &str = "-//DoseTrack//NONSGML v1.0//EN";

/// Build the iCalendar payload for the given treatments at `now`.
///
/// Inactive treatments are ignored; occurrences before `now` are
/// fast-forwarded past, and a treatment's end date caps its series.
/// Non-recurring treatments contribute at most their single pending
/// occurrence.
pub fn export_ics(treatments: &[Treatment], now: DateTime<Utc>) -> String {
    let horizon = now + Duration::days(CALENDAR_EXPORT_DAYS);
    let mut ics = String::new();

    push_line(&mut ics, "BEGIN:VCALENDAR");
    push_line(&mut ics, "VERSION:2.0");
    push_line(&mut ics, &format!("PRODID:{PRODID}"));

    for treatment in treatments.iter().filter(|t| t.active) {
        // Unlike the scheduler's catch-up, an occurrence landing
        // exactly on "now" is still worth exporting.
        let mut next = treatment.next_scheduled_time;
        if treatment.is_recurring() {
            while next < now {
                next += treatment.frequency();
            }
        }

        while next < horizon {
            if treatment.end_date.is_some_and(|end| next > end) {
                break;
            }
            if next >= now {
                push_event(&mut ics, treatment, next, now);
            }
            if !treatment.is_recurring() {
                break;
            }
            next += treatment.frequency();
        }
    }

    push_line(&mut ics, "END:VCALENDAR");
    ics
}

fn push_event(
    ics: &mut String,
    treatment: &Treatment,
    occurrence: DateTime<Utc>,
    stamp: DateTime<Utc>,
) {
    let end = occurrence + Duration::minutes(CALENDAR_EVENT_MINUTES);
    let kind = match treatment.kind {
        TreatmentKind::Medication => "Medication",
        TreatmentKind::Cure => "Cure",
    };
    let instructions = treatment.instructions.as_deref().unwrap_or("");

    push_line(ics, "BEGIN:VEVENT");
    push_line(
        ics,
        &format!("UID:{}-{}@dosetrack.app", treatment.id, occurrence.timestamp_millis()),
    );
    push_line(ics, &format!("DTSTAMP:{}", format_ics(stamp)));
    push_line(ics, &format!("DTSTART:{}", format_ics(occurrence)));
    push_line(ics, &format!("DTEND:{}", format_ics(end)));
    push_line(ics, &format!("SUMMARY:Take {}", escape_text(&treatment.name)));
    push_line(ics, &format!("DESCRIPTION:{}: {}", kind, escape_text(instructions)));
    push_line(ics, "BEGIN:VALARM");
    push_line(ics, "ACTION:DISPLAY");
    push_line(ics, &format!("DESCRIPTION:Take {}", escape_text(&treatment.name)));
    push_line(ics, "TRIGGER:-PT5M");
    push_line(ics, "END:VALARM");
    push_line(ics, "END:VEVENT");
}

fn format_ics(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

/// RFC 5545 text escaping for SUMMARY/DESCRIPTION values.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            other => escaped.push(other),
        }
    }
    escaped
}

fn push_line(ics: &mut String, line: &str) {
    ics.push_str(line);
    ics.push_str("\r\n");
}
