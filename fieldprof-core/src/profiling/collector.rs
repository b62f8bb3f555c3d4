//! Per-field collection state for the single pass.

use crate::models::{FieldDescriptor, FieldDomain, FieldValue, RecordId, TemporalValue};
use crate::sampling::{ReservoirSampler, StreamingStats};

use super::config::ProfilerConfig;

/// Derives an independent reservoir seed for one stream of a run.
pub(crate) fn derive_seed(base: u64, stream: u64) -> u64 {
    base ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn sampler<T>(capacity: usize, seed: Option<u64>, stream: u64) -> ReservoirSampler<T> {
    match seed {
        Some(base) => ReservoirSampler::with_seed(capacity, derive_seed(base, stream)),
        None => ReservoirSampler::new(capacity),
    }
}

/// Whether a string contains characters that do not print.
///
/// Tab, newline and carriage return are allowed. Control characters,
/// whitespace other than the plain space, format characters (zero-width
/// marks, bidi controls, BOM) and private-use code points are flagged.
pub fn has_non_printable(text: &str) -> bool {
    text.chars().any(|c| {
        if matches!(c, '\t' | '\n' | '\r' | ' ') {
            return false;
        }
        c.is_control()
            || c.is_whitespace()
            || matches!(
                c,
                '\u{00AD}'
                    | '\u{061C}'
                    | '\u{180E}'
                    | '\u{200B}'..='\u{200F}'
                    | '\u{202A}'..='\u{202E}'
                    | '\u{2060}'..='\u{2064}'
                    | '\u{FEFF}'
                    | '\u{E000}'..='\u{F8FF}'
            )
    })
}

/// Exact earliest and latest temporal values seen during the pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemporalExtrema {
    min: Option<TemporalValue>,
    max: Option<TemporalValue>,
    has_time: bool,
}

impl TemporalExtrema {
    /// Incorporates one value.
    pub fn update(&mut self, value: TemporalValue) {
        let key = value.as_datetime();
        if self.min.is_none_or(|min| key < min.as_datetime()) {
            self.min = Some(value);
        }
        if self.max.is_none_or(|max| key > max.as_datetime()) {
            self.max = Some(value);
        }
        self.has_time |= value.has_time();
    }

    /// Earliest value.
    pub fn min(&self) -> Option<TemporalValue> {
        self.min
    }

    /// Latest value.
    pub fn max(&self) -> Option<TemporalValue> {
        self.max
    }

    /// Whether any value carried a time of day.
    pub fn has_time(&self) -> bool {
        self.has_time
    }
}

/// A capped list of record identifiers next to an exact occurrence count.
#[derive(Debug, Clone, Default)]
pub struct FlaggedRecords {
    count: u64,
    ids: Vec<RecordId>,
    cap: usize,
}

impl FlaggedRecords {
    fn with_cap(cap: usize) -> Self {
        Self {
            count: 0,
            ids: Vec::new(),
            cap,
        }
    }

    fn flag(&mut self, id: RecordId) {
        self.count += 1;
        if self.ids.len() < self.cap {
            self.ids.push(id);
        }
    }

    /// Exact number of flagged occurrences.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Up to `cap` flagged record identifiers, in pass order.
    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }
}

/// Accumulated state of one field during a run.
///
/// Owned exclusively by the engine's worker and read-only once the pass
/// ends.
#[derive(Debug)]
pub struct FieldCollector {
    descriptor: FieldDescriptor,
    null_count: u64,
    stats: Option<StreamingStats>,
    reservoir: ReservoirSampler<FieldValue>,
    temporal: Option<ReservoirSampler<TemporalValue>>,
    extrema: TemporalExtrema,
    conversion_errors: FlaggedRecords,
    non_printable: FlaggedRecords,
    is_exact: bool,
    max_exact_values: u64,
}

impl FieldCollector {
    /// Creates the collector for one field.
    pub fn new(descriptor: FieldDescriptor, config: &ProfilerConfig) -> Self {
        let stream = descriptor.index as u64 * 2;
        let capacity = config.max_exact_values;
        let stats = (descriptor.domain == FieldDomain::Numeric).then(StreamingStats::new);
        let temporal = (descriptor.domain == FieldDomain::Temporal)
            .then(|| sampler(capacity, config.seed, stream + 1));

        Self {
            descriptor,
            null_count: 0,
            stats,
            reservoir: sampler(capacity, config.seed, stream),
            temporal,
            extrema: TemporalExtrema::default(),
            conversion_errors: FlaggedRecords::with_cap(config.id_list_cap),
            non_printable: FlaggedRecords::with_cap(config.id_list_cap),
            is_exact: true,
            max_exact_values: capacity as u64,
        }
    }

    /// Observes the field's value in one record.
    ///
    /// Returns the converted real when the field is numeric and the value
    /// converted successfully.
    pub fn observe(&mut self, id: RecordId, value: &FieldValue) -> Option<f64> {
        let domain = self.descriptor.domain;
        if value.is_null_for(domain) {
            self.null_count += 1;
            return None;
        }

        self.reservoir.update(value.clone());
        if self.is_exact && self.reservoir.count_seen() > self.max_exact_values {
            self.is_exact = false;
        }

        match domain {
            FieldDomain::Numeric => {
                let converted = value.as_f64();
                match (converted, self.stats.as_mut()) {
                    (Some(real), Some(stats)) => stats.update(real),
                    _ => self.conversion_errors.flag(id),
                }
                converted
            }
            FieldDomain::Text => {
                if value.as_text().is_some_and(has_non_printable) {
                    self.non_printable.flag(id);
                }
                None
            }
            FieldDomain::Temporal => {
                match (value.as_temporal(), self.temporal.as_mut()) {
                    (Some(temporal), Some(reservoir)) => {
                        reservoir.update(temporal);
                        self.extrema.update(temporal);
                    }
                    _ => self.conversion_errors.flag(id),
                }
                None
            }
            FieldDomain::Other => None,
        }
    }

    /// Field being collected.
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// Rows whose value was null.
    pub fn null_count(&self) -> u64 {
        self.null_count
    }

    /// Rows whose value was not null.
    pub fn non_null_count(&self) -> u64 {
        self.reservoir.count_seen()
    }

    /// Whether sample-derived statistics are exact.
    pub fn is_exact(&self) -> bool {
        self.is_exact
    }

    /// Running numeric statistics, present for numeric fields.
    pub fn stats(&self) -> Option<&StreamingStats> {
        self.stats.as_ref()
    }

    /// Sample of raw non-null values.
    pub fn raw_sample(&self) -> &[FieldValue] {
        self.reservoir.sample()
    }

    /// Sample of raw non-null values in stream order, for first-seen ties.
    pub fn ordered_raw_sample(&self) -> Vec<&FieldValue> {
        self.reservoir.arrival_order()
    }

    /// Sample of original temporal values in stream order, present for
    /// temporal fields.
    pub fn temporal_sample(&self) -> Vec<TemporalValue> {
        match &self.temporal {
            Some(reservoir) => reservoir.arrival_order().into_iter().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Number of values offered to the temporal reservoir.
    pub fn temporal_count(&self) -> u64 {
        self.temporal.as_ref().map_or(0, ReservoirSampler::count_seen)
    }

    /// Exact temporal extrema.
    pub fn temporal_extrema(&self) -> &TemporalExtrema {
        &self.extrema
    }

    /// Values that failed conversion to the field's domain.
    pub fn conversion_errors(&self) -> &FlaggedRecords {
        &self.conversion_errors
    }

    /// Text values containing non-printable characters.
    pub fn non_printable(&self) -> &FlaggedRecords {
        &self.non_printable
    }
}
