//! Engine-neutral bind and result values.
//!
//! Every statement the engine runs takes its positional parameters as
//! `SqlValue`s and hands its result set back as a flat list of `SqlValue`s
//! (row-major, `columns` values per row). Date/time values are written as
//! ISO-8601 text so both engines store them the same way.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// ISO-8601 layout used for every stored date/time.
pub const ISO_DATETIME: &str = "%Y-%m-%dT%H:%M:%S";
pub const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum SqlValue {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view of the value; text is parsed, null and garbage give 0.
    pub fn to_i64(&self) -> i64 {
        self.as_i64().unwrap_or(0)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            SqlValue::Real(v) => Some(*v as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Real view of the value. Text is re-parsed so that numbers stored
    /// through text affinity come back as numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(v) => Some(*v as f64),
            SqlValue::Real(v) => Some(*v),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.as_f64().unwrap_or(0.0)
    }

    /// Text view; null becomes the empty string.
    pub fn to_text(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Integer(v) => v.to_string(),
            SqlValue::Real(v) => v.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Blob(b) => String::from_utf8_lossy(b).into_owned(),
            SqlValue::DateTime(dt) => dt.format(ISO_DATETIME).to_string(),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_text())
        }
    }

    /// Decode a stored ISO-8601 value. Accepts a bare date as midnight.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::DateTime(dt) => Some(*dt),
            SqlValue::Text(s) => parse_iso_datetime(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        self.as_datetime().map(|dt| dt.date())
    }

    /// Integer id where 0/null means "no reference".
    pub fn as_ref_id(&self) -> Option<i64> {
        self.as_i64().filter(|id| *id != 0)
    }
}

pub fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for layout in [ISO_DATETIME, "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, ISO_DATE)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Text(s) => write!(f, "'{}'", s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Text(v.format(ISO_DATE).to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Build a `Vec<SqlValue>` from heterogeneous arguments.
#[macro_export]
macro_rules! sql_values {
    () => { Vec::<$crate::db::SqlValue>::new() };
    ($($v:expr),+ $(,)?) => { vec![$($crate::db::SqlValue::from($v)),+] };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_reparse_from_text() {
        assert_eq!(SqlValue::Text("2.8".into()).as_f64(), Some(2.8));
        assert_eq!(SqlValue::Text(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(SqlValue::Null.to_i64(), 0);
    }

    #[test]
    fn test_iso_dates() {
        let dt = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap();
        let stored = SqlValue::Text(SqlValue::DateTime(dt).to_text());
        assert_eq!(stored.to_text(), "2023-06-01T12:30:05");
        assert_eq!(stored.as_datetime(), Some(dt));
        assert_eq!(
            SqlValue::Text("2023-06-01".into()).as_date(),
            NaiveDate::from_ymd_opt(2023, 6, 1)
        );
        assert_eq!(SqlValue::Text(String::new()).as_datetime(), None);
    }

    #[test]
    fn test_ref_id_treats_zero_as_absent() {
        assert_eq!(SqlValue::Integer(0).as_ref_id(), None);
        assert_eq!(SqlValue::Null.as_ref_id(), None);
        assert_eq!(SqlValue::Integer(7).as_ref_id(), Some(7));
    }
}
