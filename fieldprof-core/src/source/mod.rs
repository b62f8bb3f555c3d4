//! Record sources.
//!
//! A [`RecordSource`] is a read-only, sequential cursor over typed records
//! with a fixed schema. The engine asks for the records once per run,
//! optionally restricted to a set of record identifiers.

mod json;
mod memory;

pub use json::{INFERENCE_SAMPLE_ROWS, JsonLinesSource};
pub use memory::MemorySource;

use std::collections::HashSet;

use crate::Result;
use crate::models::{FieldDescriptor, Record, RecordId};

/// Boxed iterator of records returned by a source.
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<Record>> + 'a>;

/// Read-only sequential access to the records of a dataset.
pub trait RecordSource: Send {
    /// Fields of every record, in value order.
    fn schema(&self) -> &[FieldDescriptor];

    /// Total number of records, used as the progress denominator when no
    /// selection is given.
    fn record_count(&self) -> u64;

    /// Opens a cursor over the records, restricted to `selection` when set.
    ///
    /// # Errors
    /// Returns an error if the cursor cannot be opened. Errors while
    /// reading individual records are yielded by the iterator.
    fn records<'a>(&'a mut self, selection: Option<&'a HashSet<RecordId>>)
    -> Result<RecordIter<'a>>;

    /// Looks up a field by name.
    fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.schema().iter().find(|f| f.name == name)
    }
}
