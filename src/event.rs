//! Provider-neutral event types.
//!
//! The Google provider converts API responses into these types, and the
//! ICS formatter works exclusively with them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A calendar event (provider-neutral)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Event title. Always present; an event without a title upstream
    /// carries an empty string here.
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub status: EventStatus,
    /// Last modification timestamp (DTSTAMP / LAST-MODIFIED)
    pub updated: Option<DateTime<Utc>>,
}

/// When an event starts or ends.
///
/// All-day events carry a bare date. Timed events keep whatever zone
/// information the provider reported; the instant is never re-expressed
/// in UTC or system-local time after conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    /// All-day boundary (no time-of-day, no zone)
    Date(NaiveDate),
    /// Timed boundary pinned to UTC (the provider gave no zone identifier)
    DateTimeUtc(DateTime<Utc>),
    /// Timed boundary as wall-clock time in a named zone
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}
