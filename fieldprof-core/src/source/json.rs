//! JSON Lines record source.
//!
//! Each non-blank line holds one JSON object. The schema is the union of the
//! keys of the leading rows, in first-seen order; field domains are inferred
//! from those rows unless overridden. The record identifier is the 1-based
//! line number, so identifiers stay stable across blank lines.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::Result;
use crate::error::ProfileError;
use crate::models::{FieldDescriptor, FieldDomain, FieldValue, Record, RecordId, TemporalValue};

use super::{RecordIter, RecordSource};

/// Rows inspected for schema and domain inference.
pub const INFERENCE_SAMPLE_ROWS: usize = 100;

/// Domain evidence gathered for one key.
#[derive(Debug, Default)]
struct DomainVotes {
    numbers: usize,
    temporal_text: usize,
    other_text: usize,
    other: usize,
}

impl DomainVotes {
    fn add(&mut self, value: &Value) {
        match value {
            Value::Null => {}
            Value::Number(_) => self.numbers += 1,
            Value::String(s) if s.trim().is_empty() => {}
            Value::String(s) if TemporalValue::parse(s).is_some() => self.temporal_text += 1,
            Value::String(_) => self.other_text += 1,
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => self.other += 1,
        }
    }

    fn domain(&self) -> FieldDomain {
        let kinds = [
            self.numbers,
            self.temporal_text,
            self.other_text,
            self.other,
        ]
        .iter()
        .filter(|n| **n > 0)
        .count();

        match kinds {
            0 => FieldDomain::Text,
            1 if self.numbers > 0 => FieldDomain::Numeric,
            1 if self.temporal_text > 0 => FieldDomain::Temporal,
            1 if self.other > 0 => FieldDomain::Other,
            _ => FieldDomain::Text,
        }
    }
}

/// Reads records from a JSON Lines file.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
    schema: Vec<FieldDescriptor>,
    record_count: u64,
}

impl JsonLinesSource {
    /// Opens `path`, infers the schema and counts the records.
    ///
    /// `overrides` replaces the inferred domain of the named fields.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or one of the leading
    /// rows is not a JSON object.
    pub fn open(path: impl AsRef<Path>, overrides: &HashMap<String, FieldDomain>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| ProfileError::io(format!("Failed to open {}", path.display()), e))?;

        let mut names: Vec<String> = Vec::new();
        let mut votes: HashMap<String, DomainVotes> = HashMap::new();
        let mut record_count = 0u64;

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .map_err(|e| ProfileError::io(format!("Failed to read {}", path.display()), e))?;
            if line.trim().is_empty() {
                continue;
            }
            record_count += 1;
            if record_count as usize > INFERENCE_SAMPLE_ROWS {
                continue;
            }

            let object = parse_object(&line, index as u64 + 1)?;
            for (key, value) in &object {
                if !votes.contains_key(key) {
                    names.push(key.clone());
                }
                votes.entry(key.clone()).or_default().add(value);
            }
        }

        let schema = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let domain = overrides
                    .get(&name)
                    .copied()
                    .unwrap_or_else(|| votes.get(&name).map_or(FieldDomain::Text, DomainVotes::domain));
                FieldDescriptor::new(name, domain, index)
            })
            .collect::<Vec<_>>();

        for name in overrides.keys() {
            if !schema.iter().any(|f| &f.name == name) {
                tracing::warn!("Domain override for unknown field '{}' ignored", name);
            }
        }

        tracing::debug!(
            "Opened {} with {} fields and {} records",
            path.display(),
            schema.len(),
            record_count
        );

        Ok(Self {
            path,
            schema,
            record_count,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_object(line: &str, line_number: u64) -> Result<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(ProfileError::malformed_record(
            line_number,
            format!("expected a JSON object, found {}", json_kind(&other)),
        )),
        Err(e) => Err(ProfileError::malformed_record(line_number, e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Converts a JSON value into a field value of `domain`.
///
/// Strings in temporal fields are parsed; unparseable ones stay text so the
/// collector can count them as conversion errors.
fn to_field_value(value: Option<&Value>, domain: FieldDomain) -> FieldValue {
    match value {
        None | Some(Value::Null) => FieldValue::Null,
        Some(Value::Bool(b)) => FieldValue::Bool(*b),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(FieldValue::Integer)
            .or_else(|| n.as_f64().map(FieldValue::Real))
            .unwrap_or(FieldValue::Null),
        Some(Value::String(s)) if domain == FieldDomain::Temporal => {
            TemporalValue::parse(s).map_or_else(|| FieldValue::Text(s.clone()), FieldValue::from)
        }
        Some(Value::String(s)) => FieldValue::Text(s.clone()),
        Some(other) => FieldValue::Text(other.to_string()),
    }
}

impl RecordSource for JsonLinesSource {
    fn schema(&self) -> &[FieldDescriptor] {
        &self.schema
    }

    fn record_count(&self) -> u64 {
        self.record_count
    }

    fn records<'a>(
        &'a mut self,
        selection: Option<&'a HashSet<RecordId>>,
    ) -> Result<RecordIter<'a>> {
        let file = File::open(&self.path).map_err(|e| {
            ProfileError::io(format!("Failed to open {}", self.path.display()), e)
        })?;
        let schema = &self.schema;
        let path = &self.path;

        let iter = BufReader::new(file)
            .lines()
            .enumerate()
            .filter_map(move |(index, line)| {
                let line_number = index as u64 + 1;
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        return Some(Err(ProfileError::io(
                            format!("Failed to read {}", path.display()),
                            e,
                        )));
                    }
                };
                if line.trim().is_empty() {
                    return None;
                }
                if selection.is_some_and(|ids| !ids.contains(&RecordId(line_number))) {
                    return None;
                }
                Some(parse_object(&line, line_number).map(|object| {
                    let values = schema
                        .iter()
                        .map(|field| to_field_value(object.get(&field.name), field.domain))
                        .collect();
                    Record::new(line_number, values)
                }))
            });

        Ok(Box::new(iter))
    }
}
