use std::collections::HashSet;

use crate::Result;
use crate::models::{FieldDescriptor, Record, RecordId};

use super::{RecordIter, RecordSource};

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    schema: Vec<FieldDescriptor>,
    records: Vec<Record>,
}

impl MemorySource {
    /// Creates a source over `records`.
    pub fn new(schema: Vec<FieldDescriptor>, records: Vec<Record>) -> Self {
        Self { schema, records }
    }
}

impl RecordSource for MemorySource {
    fn schema(&self) -> &[FieldDescriptor] {
        &self.schema
    }

    fn record_count(&self) -> u64 {
        self.records.len() as u64
    }

    fn records<'a>(
        &'a mut self,
        selection: Option<&'a HashSet<RecordId>>,
    ) -> Result<RecordIter<'a>> {
        Ok(Box::new(
            self.records
                .iter()
                .filter(move |r| selection.is_none_or(|ids| ids.contains(&r.id)))
                .cloned()
                .map(Ok),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDomain, FieldValue};

    #[test]
    fn test_selection_filters_records() {
        let schema = vec![FieldDescriptor::new("n", FieldDomain::Numeric, 0)];
        let records = (0..5)
            .map(|i| Record::new(i, vec![FieldValue::Integer(i as i64)]))
            .collect();
        let mut source = MemorySource::new(schema, records);
        assert_eq!(source.record_count(), 5);

        let selection: HashSet<RecordId> = [RecordId(1), RecordId(3), RecordId(9)].into();
        let ids: Vec<RecordId> = source
            .records(Some(&selection))
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec![RecordId(1), RecordId(3)]);
        assert_eq!(source.records(None).unwrap().count(), 5);
        assert!(source.field("n").is_some());
        assert!(source.field("missing").is_none());
    }
}
