//! In-memory implementation of every collaborator trait.
//!
//! Suitable for embedding and for tests. Thread-safe via `RwLock`.

use crate::{
    AccessPolicy, CustomField, CustomFieldStore, FieldVisibility, Record, RecordId, RecordStore,
    RecordTypeDescriptor, RecordTypeId, RelationStore, RelationType, SchemaCatalog, Value, Viewer,
};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory schema, records, custom fields, relations and policies.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    record_types: RwLock<HashMap<RecordTypeId, RecordTypeDescriptor>>,
    hidden_fields: RwLock<HashSet<(RecordTypeId, String)>>,
    records: RwLock<HashMap<RecordId, Record>>,
    /// Records only some viewers may see; superusers see everything.
    restricted: RwLock<HashMap<RecordId, HashSet<Uuid>>>,
    custom_fields: RwLock<HashMap<i64, CustomField>>,
    custom_values: RwLock<HashMap<(i64, RecordId), Value>>,
    relation_types: RwLock<HashMap<String, RelationType>>,
    /// (subject, relation type, object) triples in insertion order.
    relations: RwLock<Vec<(RecordId, String, RecordId)>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record_type(&self, descriptor: RecordTypeDescriptor) {
        self.record_types
            .write()
            .unwrap()
            .insert(descriptor.id.clone(), descriptor);
    }

    /// Administratively hide (or show again) an attribute.
    pub fn set_hidden(&self, record_type: &RecordTypeId, field: &str, hidden: bool) {
        let mut hidden_fields = self.hidden_fields.write().unwrap();
        let key = (record_type.clone(), field.to_string());
        if hidden {
            hidden_fields.insert(key);
        } else {
            hidden_fields.remove(&key);
        }
    }

    pub fn add_record(&self, record: Record) {
        self.records.write().unwrap().insert(record.id, record);
    }

    /// Restrict a record to the given viewers (plus superusers).
    pub fn restrict(&self, record: RecordId, allowed: impl IntoIterator<Item = Uuid>) {
        self.restricted
            .write()
            .unwrap()
            .insert(record, allowed.into_iter().collect());
    }

    pub fn add_custom_field(&self, field: CustomField) {
        self.custom_fields.write().unwrap().insert(field.id, field);
    }

    /// Hard-delete a custom field and its values.
    pub fn remove_custom_field(&self, id: i64) {
        self.custom_fields.write().unwrap().remove(&id);
        self.custom_values
            .write()
            .unwrap()
            .retain(|(field, _), _| *field != id);
    }

    pub fn set_custom_value(&self, field: i64, record: RecordId, value: Value) {
        self.custom_values
            .write()
            .unwrap()
            .insert((field, record), value);
    }

    pub fn add_relation_type(&self, relation_type: RelationType) {
        self.relation_types
            .write()
            .unwrap()
            .insert(relation_type.id.clone(), relation_type);
    }

    pub fn relate(&self, subject: RecordId, relation_type: &str, object: RecordId) {
        self.relations
            .write()
            .unwrap()
            .push((subject, relation_type.to_string(), object));
    }

    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }
}

impl SchemaCatalog for InMemoryCatalog {
    fn record_type(&self, id: &RecordTypeId) -> Option<RecordTypeDescriptor> {
        self.record_types.read().unwrap().get(id).cloned()
    }
}

impl FieldVisibility for InMemoryCatalog {
    fn is_hidden(&self, record_type: &RecordTypeId, field: &str) -> bool {
        self.hidden_fields
            .read()
            .unwrap()
            .contains(&(record_type.clone(), field.to_string()))
    }
}

impl AccessPolicy for InMemoryCatalog {
    fn may_view(&self, viewer: &Viewer, record: &Record) -> bool {
        if viewer.is_superuser {
            return true;
        }
        match self.restricted.read().unwrap().get(&record.id) {
            Some(allowed) => allowed.contains(&viewer.id),
            None => true,
        }
    }
}

impl CustomFieldStore for InMemoryCatalog {
    fn custom_fields(&self, record_type: &RecordTypeId) -> Vec<CustomField> {
        let mut fields: Vec<CustomField> = self
            .custom_fields
            .read()
            .unwrap()
            .values()
            .filter(|f| &f.record_type == record_type)
            .cloned()
            .collect();
        fields.sort_by_key(|f| f.id);
        fields
    }

    fn custom_field_by_id(&self, id: i64) -> Option<CustomField> {
        self.custom_fields.read().unwrap().get(&id).cloned()
    }

    fn custom_field_by_uuid(&self, uuid: Uuid) -> Option<CustomField> {
        self.custom_fields
            .read()
            .unwrap()
            .values()
            .find(|f| f.uuid == uuid)
            .cloned()
    }

    fn bulk_values(&self, fields: &[i64], records: &[RecordId]) -> HashMap<(i64, RecordId), Value> {
        let values = self.custom_values.read().unwrap();
        let mut result = HashMap::new();
        for field in fields {
            for record in records {
                if let Some(value) = values.get(&(*field, *record)) {
                    result.insert((*field, *record), value.clone());
                }
            }
        }
        result
    }
}

impl RelationStore for InMemoryCatalog {
    fn relation_type(&self, id: &str) -> Option<RelationType> {
        self.relation_types.read().unwrap().get(id).cloned()
    }

    fn bulk_related(
        &self,
        relation_types: &[String],
        subjects: &[RecordId],
    ) -> HashMap<(String, RecordId), Vec<Record>> {
        let relations = self.relations.read().unwrap();
        let records = self.records.read().unwrap();
        let subjects: HashSet<RecordId> = subjects.iter().copied().collect();

        let mut result: HashMap<(String, RecordId), Vec<Record>> = HashMap::new();
        for (subject, rtype, object) in relations.iter() {
            if !subjects.contains(subject) || !relation_types.contains(rtype) {
                continue;
            }
            if let Some(object) = records.get(object) {
                result
                    .entry((rtype.clone(), *subject))
                    .or_default()
                    .push(object.clone());
            }
        }
        result
    }
}

impl RecordStore for InMemoryCatalog {
    fn records(&self, ids: &[RecordId]) -> Vec<Record> {
        let records = self.records.read().unwrap();
        ids.iter().filter_map(|id| records.get(id).cloned()).collect()
    }
}
