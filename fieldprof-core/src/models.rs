//! Record and schema models shared by sources, collectors and reports.
//!
//! A record source exposes a fixed schema of [`FieldDescriptor`]s and yields
//! [`Record`]s whose values are positionally aligned with that schema.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProfileError;

/// Declared value domain of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDomain {
    /// Integers and reals
    Numeric,
    /// Free text
    Text,
    /// Dates and date-times
    Temporal,
    /// Anything else (booleans, blobs); only null accounting applies
    Other,
}

impl fmt::Display for FieldDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldDomain::Numeric => "numeric",
            FieldDomain::Text => "text",
            FieldDomain::Temporal => "temporal",
            FieldDomain::Other => "other",
        };
        f.write_str(name)
    }
}

impl FromStr for FieldDomain {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" | "number" | "integer" | "real" => Ok(FieldDomain::Numeric),
            "text" | "string" => Ok(FieldDomain::Text),
            "temporal" | "date" | "datetime" => Ok(FieldDomain::Temporal),
            "other" => Ok(FieldDomain::Other),
            other => Err(ProfileError::configuration(format!(
                "unknown field domain '{}'",
                other
            ))),
        }
    }
}

/// A field of the record source schema. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, unique within the schema
    pub name: String,
    /// Declared value domain
    pub domain: FieldDomain,
    /// Position of the field's value inside each record
    pub index: usize,
}

impl FieldDescriptor {
    /// Creates a new field descriptor.
    pub fn new(name: impl Into<String>, domain: FieldDomain, index: usize) -> Self {
        Self {
            name: name.into(),
            domain,
            index,
        }
    }
}

/// Stable identifier of a record within its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A date or date-time value in its original representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TemporalValue {
    /// Calendar date without a time component
    Date(NaiveDate),
    /// Date with a time-of-day component
    DateTime(NaiveDateTime),
}

impl TemporalValue {
    /// Returns the value as a date-time; dates map to midnight.
    pub fn as_datetime(&self) -> NaiveDateTime {
        match self {
            TemporalValue::Date(date) => date.and_time(NaiveTime::MIN),
            TemporalValue::DateTime(dt) => *dt,
        }
    }

    /// Returns the calendar date part.
    pub fn date(&self) -> NaiveDate {
        match self {
            TemporalValue::Date(date) => *date,
            TemporalValue::DateTime(dt) => dt.date(),
        }
    }

    /// Whether the value carries a time-of-day component.
    pub fn has_time(&self) -> bool {
        matches!(self, TemporalValue::DateTime(_))
    }

    /// Parses ISO-8601 style dates and date-times.
    ///
    /// Offsets in RFC 3339 input are dropped; the wall-clock time is kept.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(TemporalValue::DateTime(dt.naive_local()));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                return Some(TemporalValue::DateTime(dt));
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(TemporalValue::Date)
    }
}

impl fmt::Display for TemporalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            TemporalValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A typed value read from a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    /// Missing value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Real(f64),
    /// Text value
    Text(String),
    /// Calendar date
    Date(NaiveDate),
    /// Date with time of day
    DateTime(NaiveDateTime),
}

static NULL_VALUE: FieldValue = FieldValue::Null;

impl FieldValue {
    /// Domain-specific null test.
    ///
    /// `Null` is null everywhere. Temporal fields also treat blank text as
    /// an unset date.
    pub fn is_null_for(&self, domain: FieldDomain) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) if domain == FieldDomain::Temporal => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Converts the value to a finite real number.
    ///
    /// Text is parsed after trimming. Non-finite results ("NaN", "inf") are
    /// rejected so they cannot poison running statistics.
    pub fn as_f64(&self) -> Option<f64> {
        let numeric = match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Real(r) => Some(*r),
            FieldValue::Text(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        numeric.filter(|v| v.is_finite())
    }

    /// Returns the value as a temporal value, parsing text when needed.
    pub fn as_temporal(&self) -> Option<TemporalValue> {
        match self {
            FieldValue::Date(date) => Some(TemporalValue::Date(*date)),
            FieldValue::DateTime(dt) => Some(TemporalValue::DateTime(*dt)),
            FieldValue::Text(text) => TemporalValue::parse(text),
            _ => None,
        }
    }

    /// Returns the text content if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Renders the value the way it is shown in top-value lists.
    pub fn display_string(&self) -> String {
        match self {
            FieldValue::Null => "NULL".to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Real(r) => r.to_string(),
            FieldValue::Text(text) => text.clone(),
            FieldValue::Date(date) => TemporalValue::Date(*date).to_string(),
            FieldValue::DateTime(dt) => TemporalValue::DateTime(*dt).to_string(),
        }
    }
}

impl From<TemporalValue> for FieldValue {
    fn from(value: TemporalValue) -> Self {
        match value {
            TemporalValue::Date(date) => FieldValue::Date(date),
            TemporalValue::DateTime(dt) => FieldValue::DateTime(dt),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

/// One row of the record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier used for selection filters and flagged-row lists
    pub id: RecordId,
    /// Values aligned with the source schema
    pub values: Vec<FieldValue>,
}

impl Record {
    /// Creates a new record.
    pub fn new(id: u64, values: Vec<FieldValue>) -> Self {
        Self {
            id: RecordId(id),
            values,
        }
    }

    /// Returns the value at a schema index; missing positions read as null.
    pub fn value(&self, index: usize) -> &FieldValue {
        self.values.get(index).unwrap_or(&NULL_VALUE)
    }
}
