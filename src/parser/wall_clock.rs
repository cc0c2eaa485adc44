//! Wall-clock ("System Time") parsing for power table rows.
//!
//! Two shapes are understood:
//! - `HH:MM:SS:mmm`, anchored to a fixed date (only intra-recording ordering matters)
//! - `YYYY-MM-DD HH:MM:SS[.ffffff]`, in local time, or RFC 3339 with an offset

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parses wall-clock cells into UTC instants
///
/// **Public** - constructed once per run and shared by every row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClockParser {
    anchor_date: NaiveDate,
}

impl WallClockParser {
    /// Anchor clock-only timestamps to `anchor_date`
    pub fn new(anchor_date: NaiveDate) -> Self {
        Self { anchor_date }
    }

    /// Anchor clock-only timestamps to the current local date
    pub fn today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn anchor_date(&self) -> NaiveDate {
        self.anchor_date
    }

    /// Parse one wall-clock cell
    ///
    /// **Public** - returns `None` for anything unparseable; the caller
    /// treats the row as having no timestamp
    pub fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(time) = parse_clock_millis(text) {
            return local_to_utc(self.anchor_date.and_time(time));
        }

        if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
            return Some(with_offset.with_timezone(&Utc));
        }

        DATE_TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .and_then(local_to_utc)
    }
}

impl Default for WallClockParser {
    fn default() -> Self {
        Self::today()
    }
}

/// Parse the `HH:MM:SS:mmm` form
///
/// **Private** - internal helper for parse
fn parse_clock_millis(text: &str) -> Option<NaiveTime> {
    let parts: Vec<&str> = text.split(':').collect();
    let [hours, minutes, seconds, millis] = parts.as_slice() else {
        return None;
    };

    let millis: u32 = millis.trim().parse().ok()?;
    if millis >= 1000 {
        return None;
    }

    NaiveTime::from_hms_milli_opt(
        hours.trim().parse().ok()?,
        minutes.trim().parse().ok()?,
        seconds.trim().parse().ok()?,
        millis,
    )
}

/// Interpret a naive date-time in the local zone
///
/// Times skipped by a DST transition have no instant and yield `None`.
fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
