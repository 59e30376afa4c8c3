//! Spreadsheet cell values.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Day zero of spreadsheet date serials (1900 date system).
fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// A single spreadsheet cell.
///
/// Equality is strict: `Number(0.0)` and `Text("0")` are different values,
/// so a type change on an otherwise identical cell shows up in a diff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    /// A date-formatted cell. Kept apart from `Number` so it is written
    /// back with a date format.
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// True for `Empty` and for text that is blank after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the cell the way a user would read it. `Empty` renders as `""`.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Date cell from a spreadsheet serial (days since 1899-12-30, the
    /// fraction being the time of day), rounded to the millisecond.
    pub fn from_excel_serial(serial: f64) -> Option<Self> {
        if !serial.is_finite() {
            return None;
        }
        let ms = TimeDelta::try_milliseconds((serial * MS_PER_DAY).round() as i64)?;
        excel_epoch()?.checked_add_signed(ms).map(Self::DateTime)
    }

    /// Spreadsheet serial of a date cell.
    pub fn excel_serial(&self) -> Option<f64> {
        match self {
            Self::DateTime(dt) => {
                let ms = (*dt - excel_epoch()?).num_milliseconds();
                Some(ms as f64 / MS_PER_DAY)
            }
            _ => None,
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            // Whole numbers print without a trailing ".0" (process numbers,
            // registration ids and similar are stored as numbers by Excel).
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::DateTime(dt) if dt.num_seconds_from_midnight() == 0 => {
                write!(f, "{}", dt.format("%d/%m/%Y"))
            }
            Self::DateTime(dt) => write!(f, "{}", dt.format("%d/%m/%Y %H:%M:%S")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Option<String>> for CellValue {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::Empty, Self::Text)
    }
}
