//! Cell registry: discriminator → factory.
//!
//! Registration happens once through [`CellRegistryBuilder`]; `build()`
//! freezes the set. A frozen registry can be installed as the process-wide
//! instance with [`install_global`] and read without locking afterwards.

use crate::cell::actions::ActionsFactory;
use crate::cell::custom::CustomFieldFactory;
use crate::cell::function::FunctionFieldFactory;
use crate::cell::regular::RegularFieldFactory;
use crate::cell::relation::RelationFactory;
use crate::cell::volatile::VolatileFactory;
use crate::cell::KEY_SEPARATOR;
use crate::{
    Cell, CellDict, CellError, InvalidEntry, Record, RecordTypeId, RegistryError, RenderSession,
    Services, SubmissionError, Viewer,
};
use once_cell::sync::OnceCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Constructor and bulk loader for one cell variant.
pub trait CellFactory: Send + Sync {
    /// Stable discriminator, stored in every serialized cell.
    fn type_id(&self) -> &'static str;

    /// Build a cell of this variant for `record_type` from a raw value.
    /// Accepts both the local and the portable form of the value.
    fn build(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        value: &str,
    ) -> Result<Cell, CellError>;

    /// Warm whatever the renderer of this variant reads, for every record
    /// at once. Called once per variant group by [`RenderSession::populate`].
    fn populate(
        &self,
        _cells: &[&Cell],
        _records: &[Record],
        _viewer: &Viewer,
        _session: &RenderSession<'_>,
    ) {
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Registration phase of a [`CellRegistry`].
#[derive(Default)]
pub struct CellRegistryBuilder {
    factories: HashMap<&'static str, Arc<dyn CellFactory>>,
    order: Vec<&'static str>,
}

impl CellRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory. A second factory for the same discriminator is a
    /// fatal configuration error.
    pub fn register(
        &mut self,
        factory: impl CellFactory + 'static,
    ) -> Result<&mut Self, RegistryError> {
        let type_id = factory.type_id();

        if type_id.is_empty() {
            return Err(RegistryError::InvalidTypeId {
                type_id: type_id.to_string(),
                reason: "empty".to_string(),
            });
        }
        if type_id.contains(KEY_SEPARATOR) {
            return Err(RegistryError::InvalidTypeId {
                type_id: type_id.to_string(),
                reason: format!("contains the key separator '{KEY_SEPARATOR}'"),
            });
        }
        if self.factories.contains_key(type_id) {
            return Err(RegistryError::DuplicateType {
                type_id: type_id.to_string(),
            });
        }

        self.factories.insert(type_id, Arc::new(factory));
        self.order.push(type_id);
        Ok(self)
    }

    /// Register the six standard variants.
    pub fn register_builtins(&mut self) -> Result<&mut Self, RegistryError> {
        self.register(RegularFieldFactory)?
            .register(CustomFieldFactory)?
            .register(FunctionFieldFactory)?
            .register(RelationFactory)?
            .register(VolatileFactory)?
            .register(ActionsFactory)
    }

    /// Freeze the registry.
    pub fn build(self) -> CellRegistry {
        CellRegistry {
            factories: self.factories,
            order: self.order,
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Frozen discriminator → factory map. Read-only, so shareable across
/// threads without synchronization.
pub struct CellRegistry {
    factories: HashMap<&'static str, Arc<dyn CellFactory>>,
    order: Vec<&'static str>,
}

impl CellRegistry {
    pub fn builder() -> CellRegistryBuilder {
        CellRegistryBuilder::new()
    }

    /// Registry holding the standard variants.
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut builder = CellRegistryBuilder::new();
        builder.register_builtins()?;
        Ok(builder.build())
    }

    pub fn factory(&self, type_id: &str) -> Option<&Arc<dyn CellFactory>> {
        self.factories.get(type_id)
    }

    /// Registered discriminators in registration order.
    pub fn type_ids(&self) -> &[&'static str] {
        &self.order
    }

    /// Build one cell, reporting why it failed.
    pub fn try_build(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        type_id: &str,
        value: &str,
    ) -> Result<Cell, CellError> {
        let factory = self.factory(type_id).ok_or_else(|| CellError::UnknownType {
            type_id: type_id.to_string(),
        })?;
        factory.build(services, record_type, value)
    }

    /// Split a compact key on its first separator.
    pub fn split_key(key: &str) -> Result<(&str, &str), CellError> {
        key.split_once(KEY_SEPARATOR)
            .ok_or_else(|| CellError::MalformedKey { key: key.to_string() })
    }

    pub fn try_build_from_key(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        key: &str,
    ) -> Result<Cell, CellError> {
        let (type_id, value) = Self::split_key(key)?;
        self.try_build(services, record_type, type_id, value)
    }

    /// Build a cell from its serialized form. Never fails loudly: stale or
    /// unknown references give `None`.
    pub fn build_from_dict(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        dict: &CellDict,
    ) -> Option<Cell> {
        self.try_build(services, record_type, &dict.type_id, &dict.value)
            .map_err(|e| {
                debug!(
                    record_type = %record_type,
                    cell_type = %dict.type_id,
                    value = %dict.value,
                    error = %e,
                    "cannot build cell"
                );
            })
            .ok()
    }

    /// Like [`Self::build_from_dict`], from an untyped JSON value.
    pub fn build_from_json_value(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        value: &serde_json::Value,
    ) -> Option<Cell> {
        match serde_json::from_value::<CellDict>(value.clone()) {
            Ok(dict) => self.build_from_dict(services, record_type, &dict),
            Err(e) => {
                debug!(record_type = %record_type, error = %e, "malformed cell dict");
                None
            }
        }
    }

    /// Build a cell from a compact `"type-value"` key.
    pub fn build_from_key(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        key: &str,
    ) -> Option<Cell> {
        self.try_build_from_key(services, record_type, key)
            .map_err(|e| {
                debug!(
                    record_type = %record_type,
                    key = %key,
                    error = %e,
                    "cannot build cell from key"
                );
            })
            .ok()
    }

    /// Build every buildable cell, in order. The flag is true when at least
    /// one entry was dropped.
    pub fn build_many_from_dicts(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        dicts: &[CellDict],
    ) -> (Vec<Cell>, bool) {
        collect_flagged(dicts.iter().map(|d| self.build_from_dict(services, record_type, d)))
    }

    pub fn build_many_from_json_values(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        values: &[serde_json::Value],
    ) -> (Vec<Cell>, bool) {
        collect_flagged(
            values
                .iter()
                .map(|v| self.build_from_json_value(services, record_type, v)),
        )
    }

    pub fn build_many_from_keys<S: AsRef<str>>(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        keys: &[S],
    ) -> (Vec<Cell>, bool) {
        collect_flagged(
            keys.iter()
                .map(|k| self.build_from_key(services, record_type, k.as_ref())),
        )
    }

    /// Build a cell list from user-submitted keys.
    ///
    /// Unlike the other `build_many_*` methods nothing is dropped: any
    /// unbuildable, excluded or duplicated entry rejects the whole
    /// submission, with one message per offending entry.
    pub fn build_from_submission<S: AsRef<str>>(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        keys: &[S],
    ) -> Result<Vec<Cell>, SubmissionError> {
        let mut cells = Vec::with_capacity(keys.len());
        let mut entries = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, key) in keys.iter().enumerate() {
            let key = key.as_ref();
            let reject = |reason: String| InvalidEntry {
                index,
                key: key.to_string(),
                reason,
            };

            match self.try_build_from_key(services, record_type, key) {
                Ok(cell) if cell.is_excluded() => {
                    entries.push(reject("this column is not available".to_string()));
                }
                Ok(cell) => {
                    if let Some(first) = seen.get(&cell.key()) {
                        entries.push(reject(format!("duplicate of entry #{first}")));
                        continue;
                    }
                    seen.insert(cell.key(), index);
                    cells.push(cell);
                }
                Err(e) => entries.push(reject(e.to_string())),
            }
        }

        if entries.is_empty() {
            Ok(cells)
        } else {
            Err(SubmissionError { entries })
        }
    }

    /// Keys of `cells` that are not unique within the list.
    pub fn duplicate_keys(cells: &[Cell]) -> Vec<String> {
        let mut seen = HashSet::new();
        cells
            .iter()
            .map(Cell::key)
            .filter(|k| !seen.insert(k.clone()))
            .collect()
    }
}

impl std::fmt::Debug for CellRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellRegistry")
            .field("types", &self.order)
            .finish()
    }
}

fn collect_flagged(built: impl Iterator<Item = Option<Cell>>) -> (Vec<Cell>, bool) {
    let mut had_errors = false;
    let cells = built
        .filter_map(|cell| {
            if cell.is_none() {
                had_errors = true;
            }
            cell
        })
        .collect();
    (cells, had_errors)
}

// ============================================================================
// GLOBAL INSTANCE
// ============================================================================

static GLOBAL: OnceCell<CellRegistry> = OnceCell::new();

/// Install the process-wide registry. Can only happen once.
pub fn install_global(registry: CellRegistry) -> Result<&'static CellRegistry, RegistryError> {
    let types = registry.order.len();
    GLOBAL
        .set(registry)
        .map_err(|_| RegistryError::AlreadyInstalled)?;
    info!(types = types, "cell registry installed");
    GLOBAL.get().ok_or(RegistryError::NotInstalled)
}

/// The process-wide registry.
pub fn global() -> Result<&'static CellRegistry, RegistryError> {
    GLOBAL.get().ok_or(RegistryError::NotInstalled)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::services;
    use crate::{CellKind, CellParts, RenderTag};
    use std::any::Any;

    struct Dummy(&'static str);

    struct DummyKind;

    impl CellKind for DummyKind {
        fn render(
            &self,
            cell: &Cell,
            _record: &Record,
            _viewer: &Viewer,
            _tag: RenderTag,
            _session: &RenderSession<'_>,
        ) -> String {
            cell.value().to_string()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl CellFactory for Dummy {
        fn type_id(&self) -> &'static str {
            self.0
        }

        fn build(
            &self,
            _services: &Services,
            record_type: &RecordTypeId,
            value: &str,
        ) -> Result<Cell, CellError> {
            Ok(Cell::from_parts(
                CellParts {
                    type_id: self.0,
                    record_type: record_type.clone(),
                    value: value.to_string(),
                    title: value.to_string(),
                    excluded: false,
                    multiline: false,
                },
                DummyKind,
            ))
        }
    }

    fn contact() -> RecordTypeId {
        RecordTypeId::new("persons.contact")
    }

    #[test]
    fn test_register_duplicate_is_fatal() {
        let mut builder = CellRegistryBuilder::new();
        builder.register(Dummy("dummy")).unwrap();
        let err = builder.register(Dummy("dummy")).err();
        assert_eq!(
            err,
            Some(RegistryError::DuplicateType {
                type_id: "dummy".to_string()
            })
        );
    }

    #[test]
    fn test_register_rejects_separator_in_type_id() {
        let mut builder = CellRegistryBuilder::new();
        assert!(matches!(
            builder.register(Dummy("bad-id")),
            Err(RegistryError::InvalidTypeId { .. })
        ));
        assert!(matches!(
            builder.register(Dummy("")),
            Err(RegistryError::InvalidTypeId { .. })
        ));
    }

    #[test]
    fn test_builtins_twice_is_fatal() {
        let mut builder = CellRegistryBuilder::new();
        builder.register_builtins().unwrap();
        assert!(matches!(
            builder.register_builtins(),
            Err(RegistryError::DuplicateType { .. })
        ));
    }

    #[test]
    fn test_unknown_type_is_no_cell() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        let dict = CellDict::new("nonexistent", "x");
        assert!(registry.build_from_dict(&services, &contact(), &dict).is_none());
    }

    #[test]
    fn test_key_without_separator_is_no_cell() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        assert!(registry.build_from_key(&services, &contact(), "regular_field").is_none());
        assert!(matches!(
            registry.try_build_from_key(&services, &contact(), "regular_field"),
            Err(CellError::MalformedKey { .. })
        ));
    }

    #[test]
    fn test_key_splits_on_first_separator_only() {
        let (services, _) = services();
        let mut builder = CellRegistryBuilder::new();
        builder.register(Dummy("dummy")).unwrap();
        let registry = builder.build();

        let cell = registry
            .build_from_key(&services, &contact(), "dummy-a-b")
            .unwrap();
        assert_eq!(cell.value(), "a-b");
        assert_eq!(cell.key(), "dummy-a-b");
    }

    #[test]
    fn test_malformed_json_value_is_no_cell() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        let value = serde_json::json!({"kind": "regular_field"});
        assert!(registry
            .build_from_json_value(&services, &contact(), &value)
            .is_none());
    }

    #[test]
    fn test_build_many_keeps_order_and_flags_errors() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        let dicts = vec![
            CellDict::new("regular_field", "last_name"),
            CellDict::new("regular_field", "nope"),
            CellDict::new("bogus", "x"),
            CellDict::new("regular_field", "first_name"),
        ];
        let (cells, had_errors) = registry.build_many_from_dicts(&services, &contact(), &dicts);
        assert!(had_errors);
        let values: Vec<&str> = cells.iter().map(Cell::value).collect();
        assert_eq!(values, vec!["last_name", "first_name"]);

        let (cells, had_errors) = registry.build_many_from_keys(
            &services,
            &contact(),
            &["regular_field-first_name", "regular_field-last_name"],
        );
        assert!(!had_errors);
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn test_submission_reports_every_bad_entry() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        let keys = [
            "regular_field-last_name",
            "regular_field-nope",
            "garbage",
            "regular_field-last_name",
        ];
        let err = registry
            .build_from_submission(&services, &contact(), &keys)
            .unwrap_err();
        let indexes: Vec<usize> = err.entries.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert!(err.entries[2].reason.contains("#0"));

        let cells = registry
            .build_from_submission(&services, &contact(), &["regular_field-last_name"])
            .unwrap();
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn test_duplicate_keys() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        let (cells, _) = registry.build_many_from_keys(
            &services,
            &contact(),
            &["regular_field-last_name", "regular_field-first_name", "regular_field-last_name"],
        );
        assert_eq!(
            CellRegistry::duplicate_keys(&cells),
            vec!["regular_field-last_name".to_string()]
        );
    }
}
