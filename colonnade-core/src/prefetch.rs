//! Batch prefetch coordinator.
//!
//! [`RenderSession::populate`] groups cells by variant and hands every
//! group to its factory's bulk routine once. Those routines warm the
//! session's [`PrefetchCache`], which per-record rendering then reads.
//! A read that no populate call covered falls back to a single-record
//! fetch and logs a warning.

use crate::cell::function::FunctionOutput;
use crate::{
    Cell, CellRegistry, Record, RecordId, RecordLookup, RenderTag, Services, Value, Viewer,
};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

// ============================================================================
// CACHE
// ============================================================================

/// Values warmed by bulk routines for the lifetime of one render session.
///
/// Only holds derived data, so a poisoned lock is recovered rather than
/// propagated.
#[derive(Debug, Default)]
pub struct PrefetchCache {
    records: RwLock<HashMap<RecordId, Record>>,
    /// Record ids already requested, including ones that did not exist.
    records_covered: RwLock<HashSet<RecordId>>,
    custom_values: RwLock<HashMap<(i64, RecordId), Value>>,
    custom_covered: RwLock<HashSet<(i64, RecordId)>>,
    related: RwLock<HashMap<(String, RecordId), Vec<Record>>>,
    related_covered: RwLock<HashSet<(String, RecordId)>>,
    function_outputs: RwLock<HashMap<(String, RecordId), FunctionOutput>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl PrefetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_record_count(&self) -> usize {
        read(&self.records).len()
    }

    fn store_records(&self, requested: &[RecordId], fetched: Vec<Record>) {
        write(&self.records_covered).extend(requested.iter().copied());
        let mut records = write(&self.records);
        for record in fetched {
            records.insert(record.id, record);
        }
    }

    fn store_custom_values(
        &self,
        fields: &[i64],
        records: &[RecordId],
        values: HashMap<(i64, RecordId), Value>,
    ) {
        {
            let mut covered = write(&self.custom_covered);
            for field in fields {
                for record in records {
                    covered.insert((*field, *record));
                }
            }
        }
        write(&self.custom_values).extend(values);
    }

    fn store_related(
        &self,
        relation_types: &[String],
        subjects: &[RecordId],
        related: HashMap<(String, RecordId), Vec<Record>>,
    ) {
        {
            let mut covered = write(&self.related_covered);
            for relation_type in relation_types {
                for subject in subjects {
                    covered.insert((relation_type.clone(), *subject));
                }
            }
        }
        write(&self.related).extend(related);
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Summary of one [`RenderSession::populate`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// One entry per variant group, in first-appearance order:
    /// (discriminator, number of cells in the group).
    pub groups: Vec<(&'static str, usize)>,
}

impl PopulateReport {
    /// Number of bulk routines invoked.
    pub fn bulk_calls(&self) -> usize {
        self.groups.len()
    }
}

/// One unit of rendering work: services, the registry that built the
/// cells, and a prefetch cache scoped to this session.
pub struct RenderSession<'a> {
    services: &'a Services,
    registry: &'a CellRegistry,
    cache: PrefetchCache,
}

impl<'a> RenderSession<'a> {
    pub fn new(services: &'a Services, registry: &'a CellRegistry) -> Self {
        Self {
            services,
            registry,
            cache: PrefetchCache::new(),
        }
    }

    pub fn services(&self) -> &'a Services {
        self.services
    }

    pub fn registry(&self) -> &'a CellRegistry {
        self.registry
    }

    pub fn cache(&self) -> &PrefetchCache {
        &self.cache
    }

    /// Warm the cache for `cells` over `records`.
    ///
    /// Excluded cells are skipped. Hidden cells are still populated since
    /// they render in non-interactive contexts.
    pub fn populate(&self, cells: &[Cell], records: &[Record], viewer: &Viewer) -> PopulateReport {
        let mut order: Vec<&'static str> = Vec::new();
        let mut groups: HashMap<&'static str, Vec<&Cell>> = HashMap::new();

        for cell in cells.iter().filter(|c| !c.is_excluded()) {
            let group = groups.entry(cell.type_id()).or_insert_with(|| {
                order.push(cell.type_id());
                Vec::new()
            });
            group.push(cell);
        }

        let mut report = PopulateReport::default();
        for type_id in order {
            let group = &groups[&type_id];
            let Some(factory) = self.registry.factory(type_id) else {
                debug!(type_id = %type_id, "no factory for cell group, skipping populate");
                continue;
            };
            factory.populate(group, records, viewer, self);
            report.groups.push((type_id, group.len()));
        }
        report
    }

    pub fn render(&self, cell: &Cell, record: &Record, viewer: &Viewer, tag: RenderTag) -> String {
        cell.render(record, viewer, tag, self)
    }

    /// Render every cell of a row, in order.
    pub fn render_row(
        &self,
        cells: &[Cell],
        record: &Record,
        viewer: &Viewer,
        tag: RenderTag,
    ) -> Vec<String> {
        cells
            .iter()
            .map(|cell| self.render(cell, record, viewer, tag))
            .collect()
    }

    // === Records ===

    /// Fetch every not-yet-covered id in one call.
    pub fn warm_records(&self, ids: &[RecordId]) {
        let missing: Vec<RecordId> = {
            let covered = read(&self.cache.records_covered);
            let mut seen = HashSet::new();
            ids.iter()
                .copied()
                .filter(|id| !covered.contains(id) && seen.insert(*id))
                .collect()
        };
        if missing.is_empty() {
            return;
        }
        let fetched = self.services.records.records(&missing);
        self.cache.store_records(&missing, fetched);
    }

    /// Cached records in the order of `ids`, without fetching.
    pub fn cached_records(&self, ids: &[RecordId]) -> Vec<Record> {
        let records = read(&self.cache.records);
        ids.iter().filter_map(|id| records.get(id).cloned()).collect()
    }

    // === Custom field values ===

    pub fn warm_custom_values(&self, fields: &[i64], records: &[RecordId]) {
        let all_covered = {
            let covered = read(&self.cache.custom_covered);
            fields
                .iter()
                .all(|f| records.iter().all(|r| covered.contains(&(*f, *r))))
        };
        if all_covered || fields.is_empty() || records.is_empty() {
            return;
        }
        let values = self.services.custom_fields.bulk_values(fields, records);
        self.cache.store_custom_values(fields, records, values);
    }

    pub fn custom_value(&self, field: i64, record: RecordId) -> Option<Value> {
        if !read(&self.cache.custom_covered).contains(&(field, record)) {
            warn!(
                custom_field = field,
                record = record,
                "custom field value read without prefetch, fetching single record"
            );
            let values = self.services.custom_fields.bulk_values(&[field], &[record]);
            self.cache.store_custom_values(&[field], &[record], values);
        }
        read(&self.cache.custom_values).get(&(field, record)).cloned()
    }

    // === Relations ===

    pub fn warm_related(&self, relation_types: &[String], subjects: &[RecordId]) {
        let all_covered = {
            let covered = read(&self.cache.related_covered);
            relation_types
                .iter()
                .all(|t| subjects.iter().all(|s| covered.contains(&(t.clone(), *s))))
        };
        if all_covered || relation_types.is_empty() || subjects.is_empty() {
            return;
        }
        let related = self.services.relations.bulk_related(relation_types, subjects);
        self.cache.store_related(relation_types, subjects, related);
    }

    pub fn related(&self, relation_type: &str, subject: RecordId) -> Vec<Record> {
        let key = (relation_type.to_string(), subject);
        if !read(&self.cache.related_covered).contains(&key) {
            warn!(
                relation_type = %relation_type,
                record = subject,
                "related records read without prefetch, fetching single record"
            );
            let types = [relation_type.to_string()];
            let related = self.services.relations.bulk_related(&types, &[subject]);
            self.cache.store_related(&types, &[subject], related);
        }
        read(&self.cache.related)
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    // === Function outputs ===

    pub fn store_function_outputs(
        &self,
        function: &str,
        outputs: impl IntoIterator<Item = (RecordId, FunctionOutput)>,
    ) {
        let mut cache = write(&self.cache.function_outputs);
        for (record, output) in outputs {
            cache.insert((function.to_string(), record), output);
        }
    }

    pub fn function_output(&self, function: &str, record: RecordId) -> Option<FunctionOutput> {
        read(&self.cache.function_outputs)
            .get(&(function.to_string(), record))
            .cloned()
    }
}

impl RecordLookup for RenderSession<'_> {
    fn record(&self, id: RecordId) -> Option<Record> {
        if !read(&self.cache.records_covered).contains(&id) {
            warn!(record = id, "related record read without prefetch, fetching single record");
            self.warm_records(&[id]);
        }
        read(&self.cache.records).get(&id).cloned()
    }

    fn records(&self, ids: &[RecordId]) -> Vec<Record> {
        let uncovered = {
            let covered = read(&self.cache.records_covered);
            ids.iter().filter(|id| !covered.contains(id)).count()
        };
        if uncovered > 0 {
            warn!(
                missing = uncovered,
                "related records read without prefetch, fetching"
            );
            self.warm_records(ids);
        }
        self.cached_records(ids)
    }

    fn may_view(&self, viewer: &Viewer, record: &Record) -> bool {
        self.services.access.may_view(viewer, record)
    }
}

impl std::fmt::Debug for RenderSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Ids referenced by `record` through `field`, if it holds a relation.
pub(crate) fn related_ids(record: &Record, field: &str) -> Vec<RecordId> {
    match record.get(field) {
        Value::Ref(id) => vec![*id],
        Value::Refs(ids) => ids.clone(),
        _ => Vec::new(),
    }
}
