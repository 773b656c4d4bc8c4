//! ICS document generation.
//!
//! `build_calendar` and `render` are pure: no clock reads, no I/O, so the
//! same input events always produce byte-identical output.

use crate::event::{Event, EventStatus, EventTime};
use icalendar::{Calendar, Component, EventLike, Property, ValueType};

/// Build the interchange document: one VEVENT per record, input order.
pub fn build_calendar(events: &[Event]) -> Calendar {
    let mut cal = Calendar::new();

    for event in events {
        cal.push(to_ics_event(event));
    }

    cal.done()
}

/// Serialize a document to ICS text (CRLF line endings, folded lines).
pub fn render(cal: &Calendar) -> String {
    strip_ics_bloat(&cal.to_string())
}

fn to_ics_event(event: &Event) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.id);
    ics_event.summary(&event.summary);

    // DTSTAMP is required by RFC 5545. Sourced from the provider's updated
    // timestamp; the epoch fallback keeps output stable when it is absent.
    let dtstamp = event
        .updated
        .unwrap_or(chrono::DateTime::UNIX_EPOCH)
        .format("%Y%m%dT%H%M%SZ")
        .to_string();
    ics_event.add_property("DTSTAMP", &dtstamp);

    // LAST-MODIFIED
    if let Some(updated) = event.updated {
        let last_modified = updated.format("%Y%m%dT%H%M%SZ").to_string();
        ics_event.add_property("LAST-MODIFIED", &last_modified);
    }

    // Set start/end times
    add_datetime_property(&mut ics_event, "DTSTART", &event.start);
    add_datetime_property(&mut ics_event, "DTEND", &event.end);

    // Optional fields
    if let Some(ref desc) = event.description {
        ics_event.description(desc);
    }

    if let Some(ref loc) = event.location {
        ics_event.location(loc);
    }

    // Status - only emit if not CONFIRMED (the implied default)
    match event.status {
        EventStatus::Confirmed => {}
        EventStatus::Tentative => {
            ics_event.add_property("STATUS", "TENTATIVE");
        }
        EventStatus::Cancelled => {
            ics_event.add_property("STATUS", "CANCELLED");
        }
    }

    ics_event.done()
}

/// Add a datetime property with formatting matching the EventTime variant
fn add_datetime_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    match time {
        EventTime::Date(d) => {
            let mut prop = Property::new(name, d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            ics_event.append_property(prop);
        }
        EventTime::DateTimeUtc(dt) => {
            // UTC datetime with Z suffix
            ics_event.add_property(name, dt.format("%Y%m%dT%H%M%SZ").to_string());
        }
        EventTime::DateTimeZoned { datetime, tzid } => {
            // Wall time with TZID parameter, exactly as the source reported it
            let mut prop = Property::new(name, datetime.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tzid);
            ics_event.append_property(prop);
        }
    }
}

/// Clean up ICS output from the icalendar crate
/// - Pin PRODID so output does not drift across crate versions
/// - Remove CALSCALE:GREGORIAN (it's the default)
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:GCAL2ICS\r\n");
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn make_test_event() -> Event {
        Event {
            id: "evt-1".to_string(),
            summary: "Team sync".to_string(),
            description: None,
            location: None,
            start: EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap()),
            end: EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2025, 3, 20, 16, 0, 0).unwrap()),
            status: EventStatus::Confirmed,
            updated: Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    fn render_events(events: &[Event]) -> String {
        render(&build_calendar(events))
    }

    #[test]
    fn test_all_day_event_has_no_time_component() {
        let mut event = make_test_event();
        event.id = "e1".to_string();
        event.summary = "Holiday".to_string();
        event.start = EventTime::Date(NaiveDate::from_ymd_opt(2024, 12, 25).unwrap());
        event.end = EventTime::Date(NaiveDate::from_ymd_opt(2024, 12, 26).unwrap());

        let ics = render_events(&[event]);

        assert!(
            ics.contains("DTSTART;VALUE=DATE:20241225"),
            "DTSTART should be date-only with VALUE=DATE. ICS:\n{}",
            ics
        );
        assert!(
            ics.contains("DTEND;VALUE=DATE:20241226"),
            "DTEND should be date-only with VALUE=DATE. ICS:\n{}",
            ics
        );

        let dtstart_value = ics
            .lines()
            .find(|l| l.starts_with("DTSTART"))
            .and_then(|l| l.split_once(':'))
            .map(|(_, v)| v)
            .expect("Should have a DTSTART line");
        assert_eq!(
            dtstart_value, "20241225",
            "All-day DTSTART must carry no time-of-day"
        );
    }

    #[test]
    fn test_zoned_event_keeps_source_zone() {
        let mut event = make_test_event();
        event.id = "e2".to_string();
        event.summary = "Standup".to_string();
        event.start = EventTime::DateTimeZoned {
            datetime: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            tzid: "America/Los_Angeles".to_string(),
        };
        event.end = EventTime::DateTimeZoned {
            datetime: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
            tzid: "America/Los_Angeles".to_string(),
        };

        let ics = render_events(&[event]);

        assert!(
            ics.contains("DTSTART;TZID=America/Los_Angeles:20240601T090000"),
            "DTSTART should keep the source zone and wall time. ICS:\n{}",
            ics
        );
        // 09:00-07:00 is 16:00 UTC; it must not be normalized
        assert!(
            !ics.contains("160000Z"),
            "Zoned times must not be re-expressed in UTC. ICS:\n{}",
            ics
        );
    }

    #[test]
    fn test_utc_event_uses_z_suffix() {
        let ics = render_events(&[make_test_event()]);

        assert!(
            ics.contains("DTSTART:20250320T150000Z"),
            "UTC DTSTART should use the Z form. ICS:\n{}",
            ics
        );
        assert!(ics.contains("DTEND:20250320T160000Z"));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let events = vec![make_test_event(), {
            let mut e = make_test_event();
            e.id = "evt-2".to_string();
            e.start = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 21).unwrap());
            e.end = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 22).unwrap());
            e
        }];

        let first = render_events(&events);
        let second = render_events(&events);

        assert_eq!(first, second, "repeated serialization must be byte-identical");
    }

    #[test]
    fn test_empty_input_still_produces_envelope() {
        let ics = render_events(&[]);

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("END:VCALENDAR"));
        assert!(
            !ics.contains("BEGIN:VEVENT"),
            "empty input must produce no entries. ICS:\n{}",
            ics
        );
        assert!(!ics.is_empty());
    }

    #[test]
    fn test_one_entry_per_event_in_input_order() {
        let mut events = Vec::new();
        for id in ["e1", "e2", "e3"] {
            let mut e = make_test_event();
            e.id = id.to_string();
            events.push(e);
        }

        let ics = render_events(&events);

        let vevent_count = ics.lines().filter(|l| *l == "BEGIN:VEVENT").count();
        assert_eq!(vevent_count, 3, "one VEVENT per input record. ICS:\n{}", ics);

        let uids: Vec<&str> = ics.lines().filter(|l| l.starts_with("UID:")).collect();
        assert_eq!(
            uids,
            vec!["UID:e1", "UID:e2", "UID:e3"],
            "entries must preserve input order"
        );
    }

    #[test]
    fn test_missing_summary_still_emits_title() {
        let mut event = make_test_event();
        event.summary = String::new();

        let ics = render_events(&[event]);

        assert!(
            ics.lines().any(|l| l == "SUMMARY:"),
            "an untitled event still gets a SUMMARY line. ICS:\n{}",
            ics
        );
    }

    #[test]
    fn test_dtstamp_is_stable_without_updated() {
        let mut event = make_test_event();
        event.updated = None;

        let ics = render_events(&[event]);

        assert!(
            ics.contains("DTSTAMP:19700101T000000Z"),
            "DTSTAMP must not depend on the current time. ICS:\n{}",
            ics
        );
        assert!(!ics.contains("LAST-MODIFIED"));
    }

    #[test]
    fn test_description_and_location_are_optional() {
        let bare = render_events(&[make_test_event()]);
        assert!(!bare.contains("DESCRIPTION"));
        assert!(!bare.contains("LOCATION"));

        let mut event = make_test_event();
        event.description = Some("Weekly catch-up".to_string());
        event.location = Some("Room 2".to_string());

        let ics = render_events(&[event]);
        assert!(ics.contains("DESCRIPTION:Weekly catch-up"));
        assert!(ics.contains("LOCATION:Room 2"));
    }

    #[test]
    fn test_status_emitted_when_not_confirmed() {
        let confirmed = render_events(&[make_test_event()]);
        assert!(!confirmed.contains("STATUS"));

        let mut event = make_test_event();
        event.status = EventStatus::Cancelled;

        let ics = render_events(&[event]);
        assert!(ics.contains("STATUS:CANCELLED"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let ics = render_events(&[make_test_event()]);

        assert!(ics.ends_with("\r\n"));
        assert!(
            !ics.replace("\r\n", "").contains('\n'),
            "every line must be CRLF-terminated"
        );
    }
}
