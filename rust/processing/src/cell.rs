// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw cell values as delivered by the geometry extractor or a spreadsheet
//! export, plus the coercions the pipeline applies to them.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// One raw input row: column name to cell value.
pub type RawRow = BTreeMap<String, CellValue>;

/// A single untyped cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Placeholder the geometry extractor writes for missing strings.
const NOT_AVAILABLE: &str = "N/A";

/// Day zero of spreadsheet serial dates.
fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d"];

impl CellValue {
    /// True for null cells, NaN numbers and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Number(n) => n.is_nan(),
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Bool(_) => false,
        }
    }

    /// Numeric coercion: numbers pass through, numeric text is parsed,
    /// everything else (including NaN) is absent.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if !n.is_nan() => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            _ => None,
        }
    }

    /// String coercion. Integral numbers render without a fraction so that
    /// numeric ids read back the way they were written.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Number(n) if n.is_nan() => None,
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }

    /// Like [`as_text`](Self::as_text) but also treats the extractor's
    /// `"N/A"` placeholder as absent.
    pub fn as_label(&self) -> Option<String> {
        self.as_text().filter(|s| s != NOT_AVAILABLE)
    }

    /// Non-negative integer coercion used for task GUIDs.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u64)
    }

    /// Timestamp coercion. Blank cells are `Ok(None)`; unparseable cells
    /// return the offending text.
    pub fn as_timestamp(&self) -> std::result::Result<Option<NaiveDateTime>, String> {
        match self {
            CellValue::Null => Ok(None),
            CellValue::Number(n) if n.is_nan() => Ok(None),
            CellValue::Number(serial) => {
                let micros = (serial * 86_400_000_000.0).round();
                if !micros.is_finite() || micros.abs() > 1e17 {
                    return Err(serial.to_string());
                }
                Ok(Some(serial_epoch() + Duration::microseconds(micros as i64)))
            }
            CellValue::Text(s) => parse_timestamp(s),
            CellValue::Bool(b) => Err(b.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

fn parse_timestamp(raw: &str) -> std::result::Result<Option<NaiveDateTime>, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(dt.naive_local()));
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Some(dt));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date.and_hms_opt(0, 0, 0));
        }
    }
    Err(s.to_string())
}

/// Render a timestamp as ISO-8601 without offset, adding microseconds only
/// when the value has a sub-second part.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Serde helper: optional timestamps as ISO strings or `null`.
pub(crate) fn serialize_timestamp<S: Serializer>(
    value: &Option<NaiveDateTime>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
        None => serializer.serialize_none(),
    }
}
