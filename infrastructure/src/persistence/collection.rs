use domain::{Record, RecordId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The records of one resource plus its id allocator.
///
/// Ids are allocated monotonically, so ordering by id is creation order and a
/// deleted id is never handed out again.
#[derive(Debug, Clone)]
pub(crate) struct Collection {
    records: BTreeMap<RecordId, Record>,
    next_id: RecordId,
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: RecordId::FIRST,
        }
    }
}

impl Collection {
    /// Rebuilds a collection from stored records; allocation resumes after
    /// the highest id present.
    pub(crate) fn from_records(records: Vec<Record>) -> Self {
        let records: BTreeMap<_, _> = records.into_iter().map(|r| (r.id(), r)).collect();
        let next_id = records
            .keys()
            .next_back()
            .map(RecordId::next)
            .unwrap_or(RecordId::FIRST);
        Self { records, next_id }
    }

    pub(crate) fn records(&self) -> Vec<Record> {
        self.records.values().cloned().collect()
    }

    pub(crate) fn get(&self, id: RecordId) -> Option<Record> {
        self.records.get(&id).cloned()
    }

    pub(crate) fn insert(&mut self, fields: Map<String, Value>) -> Record {
        let id = self.next_id;
        self.next_id = id.next();
        let record = Record::new(id, fields);
        self.records.insert(id, record.clone());
        record
    }

    pub(crate) fn update(&mut self, id: RecordId, fields: Map<String, Value>) -> Option<Record> {
        let slot = self.records.get_mut(&id)?;
        *slot = slot.replace_fields(fields);
        Some(slot.clone())
    }

    pub(crate) fn remove(&mut self, id: RecordId) -> Option<Record> {
        self.records.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
