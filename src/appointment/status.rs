// src/appointment/status.rs

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status label persisted on `patient.status`.
/// Labels are compared as exact, case-sensitive strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Completed,
    Pending,
    Scheduled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Scheduled => "Scheduled",
        }
    }

    /// True when `stored` already carries this label.
    pub fn matches_label(&self, stored: Option<&str>) -> bool {
        stored == Some(self.as_str())
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub days_remaining: i64,
    pub is_expired: bool,
    pub status: AppointmentStatus,
}

/// Anything that can be read as an appointment's calendar date.
///
/// Returning `None` means "no usable date": the caller reports the status as
/// unknown instead of failing.
pub trait AppointmentInput {
    fn calendar_date(&self, frame: FixedOffset) -> Option<NaiveDate>;
}

impl AppointmentInput for str {
    fn calendar_date(&self, frame: FixedOffset) -> Option<NaiveDate> {
        parse_appointment_date(self, frame)
    }
}

impl AppointmentInput for String {
    fn calendar_date(&self, frame: FixedOffset) -> Option<NaiveDate> {
        parse_appointment_date(self, frame)
    }
}

impl AppointmentInput for NaiveDate {
    fn calendar_date(&self, _frame: FixedOffset) -> Option<NaiveDate> {
        Some(*self)
    }
}

impl AppointmentInput for NaiveDateTime {
    fn calendar_date(&self, _frame: FixedOffset) -> Option<NaiveDate> {
        Some(self.date())
    }
}

impl AppointmentInput for DateTime<Utc> {
    fn calendar_date(&self, frame: FixedOffset) -> Option<NaiveDate> {
        Some(self.with_timezone(&frame).date_naive())
    }
}

impl AppointmentInput for DateTime<FixedOffset> {
    fn calendar_date(&self, frame: FixedOffset) -> Option<NaiveDate> {
        Some(self.with_timezone(&frame).date_naive())
    }
}

/// Parse an ISO-8601 date or date-time into a calendar date in `frame`.
///
/// Accepted:
/// - `2024-01-01`
/// - `2024-01-01T09:30:00.000Z` / `2024-01-01T09:30:00-05:00` (converted into `frame`)
/// - `2024-01-01T09:30:00` / `2024-01-01 09:30:00` (already local to `frame`)
pub fn parse_appointment_date(input: &str, frame: FixedOffset) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&frame).date_naive());
    }
    if let Ok(dt) = s.parse::<DateTime<FixedOffset>>() {
        return Some(dt.with_timezone(&frame).date_naive());
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    None
}

/// Map an appointment date to its status relative to `today`.
///
/// Both sides are calendar dates, i.e. already normalized to midnight, so the
/// day difference is exact: same day is 0, tomorrow is 1, yesterday is -1.
pub fn derive_status(date: Option<NaiveDate>, today: NaiveDate) -> Option<StatusReport> {
    let date = date?;
    let days_remaining = date.signed_duration_since(today).num_days();

    let status = match days_remaining {
        d if d < 0 => AppointmentStatus::Completed,
        0 => AppointmentStatus::Pending,
        _ => AppointmentStatus::Scheduled,
    };

    Some(StatusReport {
        days_remaining,
        is_expired: status == AppointmentStatus::Completed,
        status,
    })
}

/// `derive_status` for raw input: absent or unparseable input yields `None`.
pub fn derive_status_from<T>(
    input: Option<&T>,
    today: NaiveDate,
    frame: FixedOffset,
) -> Option<StatusReport>
where
    T: AppointmentInput + ?Sized,
{
    derive_status(input.and_then(|i| i.calendar_date(frame)), today)
}
