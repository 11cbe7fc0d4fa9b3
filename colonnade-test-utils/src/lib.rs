//! COLONNADE Test Utilities
//!
//! Centralized test infrastructure for the COLONNADE workspace:
//! - A counting backend that records every bulk store call
//! - Test fixtures for a small contact/organisation schema
//! - Proptest generators for cell keys and render tags
//! - Custom assertions for COLONNADE-specific validation

// Re-export core types for convenience
pub use colonnade_core::{
    AccessPolicy, ActionCatalog, ActionRequirement, Cell, CellDict, CellError, CellRegistry,
    ColonnadeConfig, ColonnadeError, ColonnadeResult, CustomField, CustomFieldKind,
    CustomFieldStore, DeletionError, FieldDescriptor, FieldKind, FieldVisibility,
    FunctionFieldRegistry, FunctionOutput, InMemoryCatalog, Record, RecordAction, RecordId,
    RecordStore, RecordTypeDescriptor, RecordTypeId, RelationStore, RelationType, RenderTag,
    SchemaCatalog, Services, SimpleFunctionField, StorageError, SubmissionError, Value, Viewer,
    VolatileCatalog, VolatileColumn,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// COUNTING BACKEND
// ============================================================================

/// Number of bulk calls a backend received, per store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub records: usize,
    pub custom_values: usize,
    pub related: usize,
}

impl StoreCalls {
    pub fn total(&self) -> usize {
        self.records + self.custom_values + self.related
    }
}

/// An [`InMemoryCatalog`] that counts record, custom value and relation
/// fetches. Lookups of descriptors are not counted.
#[derive(Debug, Default)]
pub struct CountingBackend {
    catalog: InMemoryCatalog,
    records: AtomicUsize,
    custom_values: AtomicUsize,
    related: AtomicUsize,
}

impl CountingBackend {
    pub fn new(catalog: InMemoryCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    pub fn catalog(&self) -> &InMemoryCatalog {
        &self.catalog
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            records: self.records.load(Ordering::SeqCst),
            custom_values: self.custom_values.load(Ordering::SeqCst),
            related: self.related.load(Ordering::SeqCst),
        }
    }

    pub fn reset(&self) {
        self.records.store(0, Ordering::SeqCst);
        self.custom_values.store(0, Ordering::SeqCst);
        self.related.store(0, Ordering::SeqCst);
    }
}

impl SchemaCatalog for CountingBackend {
    fn record_type(&self, id: &RecordTypeId) -> Option<RecordTypeDescriptor> {
        self.catalog.record_type(id)
    }
}

impl FieldVisibility for CountingBackend {
    fn is_hidden(&self, record_type: &RecordTypeId, field: &str) -> bool {
        self.catalog.is_hidden(record_type, field)
    }
}

impl AccessPolicy for CountingBackend {
    fn may_view(&self, viewer: &Viewer, record: &Record) -> bool {
        self.catalog.may_view(viewer, record)
    }
}

impl CustomFieldStore for CountingBackend {
    fn custom_fields(&self, record_type: &RecordTypeId) -> Vec<CustomField> {
        self.catalog.custom_fields(record_type)
    }

    fn custom_field_by_id(&self, id: i64) -> Option<CustomField> {
        self.catalog.custom_field_by_id(id)
    }

    fn custom_field_by_uuid(&self, uuid: Uuid) -> Option<CustomField> {
        self.catalog.custom_field_by_uuid(uuid)
    }

    fn bulk_values(&self, fields: &[i64], records: &[RecordId]) -> HashMap<(i64, RecordId), Value> {
        self.custom_values.fetch_add(1, Ordering::SeqCst);
        self.catalog.bulk_values(fields, records)
    }
}

impl RelationStore for CountingBackend {
    fn relation_type(&self, id: &str) -> Option<RelationType> {
        self.catalog.relation_type(id)
    }

    fn bulk_related(
        &self,
        relation_types: &[String],
        subjects: &[RecordId],
    ) -> HashMap<(String, RecordId), Vec<Record>> {
        self.related.fetch_add(1, Ordering::SeqCst);
        self.catalog.bulk_related(relation_types, subjects)
    }
}

impl RecordStore for CountingBackend {
    fn records(&self, ids: &[RecordId]) -> Vec<Record> {
        self.records.fetch_add(1, Ordering::SeqCst);
        self.catalog.records(ids)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures: a contact/organisation schema with custom fields,
    //! relation types, function fields, volatile columns and actions.

    use super::*;

    pub const CONTACT: &str = "persons.contact";
    pub const ORGANISATION: &str = "persons.organisation";

    /// Id of the "Bounty" integer custom field on contacts.
    pub const BOUNTY: i64 = 1;
    /// Id of the "Hobbies" multi-choice custom field on contacts.
    pub const HOBBIES: i64 = 2;

    /// Id of the first organisation; [`populate_contacts`] relates to it.
    pub const BEBOP: RecordId = 300;

    pub fn contact() -> RecordTypeId {
        RecordTypeId::new(CONTACT)
    }

    pub fn organisation() -> RecordTypeId {
        RecordTypeId::new(ORGANISATION)
    }

    /// Schema, reference records, custom fields and relation types.
    pub fn catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.add_record_type(
            RecordTypeDescriptor::new(contact(), "Contact")
                .field(FieldDescriptor::new("first_name", "First name", FieldKind::Text))
                .field(FieldDescriptor::new("last_name", "Last name", FieldKind::Text).required())
                .field(FieldDescriptor::new("description", "Description", FieldKind::LargeText))
                .field(FieldDescriptor::new("email", "Email", FieldKind::Email))
                .field(FieldDescriptor::new("owner", "Owner", FieldKind::ToOne("auth.user".into())))
                .field(FieldDescriptor::new(
                    "languages",
                    "Languages",
                    FieldKind::ToMany("core.language".into()),
                )),
        );
        catalog.add_record_type(
            RecordTypeDescriptor::new(organisation(), "Organisation")
                .field(FieldDescriptor::new("name", "Name", FieldKind::Text)),
        );
        catalog.add_record_type(
            RecordTypeDescriptor::new("auth.user", "User")
                .field(FieldDescriptor::new("name", "Name", FieldKind::Text)),
        );
        catalog.add_record_type(
            RecordTypeDescriptor::new("core.language", "Language")
                .field(FieldDescriptor::new("code", "Code", FieldKind::Text)),
        );

        catalog.add_record(Record::new(100, "auth.user", "Jet").with("name", "Jet"));
        catalog.add_record(Record::new(200, "core.language", "English").with("code", "en"));
        catalog.add_record(Record::new(201, "core.language", "French").with("code", "fr"));
        catalog.add_record(Record::new(BEBOP, ORGANISATION, "Bebop").with("name", "Bebop"));
        catalog.add_record(Record::new(301, ORGANISATION, "Red Dragon").with("name", "Red Dragon"));

        let bounty = CustomField::new(BOUNTY, contact(), "Bounty", CustomFieldKind::Int);
        catalog.add_custom_field(bounty);
        let mut hobbies =
            CustomField::new(HOBBIES, contact(), "Hobbies", CustomFieldKind::MultiEnum);
        hobbies.choices = vec![(10, "Chess".to_string()), (11, "Go".to_string())];
        catalog.add_custom_field(hobbies);
        catalog.add_custom_field(CustomField::new(3, organisation(), "Size", CustomFieldKind::Int));

        catalog.add_relation_type(
            RelationType::new("employed_by", "is employed by")
                .with_subjects([contact()])
                .with_objects([organisation()]),
        );
        catalog.add_relation_type(RelationType::new("knows", "knows"));
        catalog.add_relation_type(RelationType::new("former", "formerly knew").disabled());

        catalog
    }

    pub fn functions() -> FunctionFieldRegistry {
        let mut functions = FunctionFieldRegistry::new();
        functions.register(
            contact(),
            SimpleFunctionField::new("full_name", "Full name", |record, _viewer| {
                let first = record.get("first_name").as_text().unwrap_or_default();
                let last = record.get("last_name").as_text().unwrap_or_default();
                FunctionOutput::Text(format!("{first} {last}").trim().to_string())
            }),
        );
        functions
    }

    pub fn volatiles() -> VolatileCatalog {
        let mut volatiles = VolatileCatalog::new();
        volatiles.register(
            contact(),
            VolatileColumn::new("initials", "Initials", |record, _viewer, _tag| {
                record.label.chars().take(1).collect()
            }),
        );
        volatiles
    }

    pub fn actions() -> ActionCatalog {
        let mut actions = ActionCatalog::new();
        actions
            .register(contact(), RecordAction::new("view", "View", ActionRequirement::View))
            .register(contact(), RecordAction::new("edit", "Edit", ActionRequirement::Change));
        actions
    }

    fn wire<B>(backend: Arc<B>) -> Services
    where
        B: SchemaCatalog
            + FieldVisibility
            + AccessPolicy
            + CustomFieldStore
            + RelationStore
            + RecordStore
            + 'static,
    {
        Services::from_backend(backend, ColonnadeConfig::default())
            .with_functions(functions())
            .with_volatiles(volatiles())
            .with_actions(actions())
    }

    /// Services wired to a fresh fixture catalog.
    pub fn services() -> (Services, Arc<InMemoryCatalog>) {
        let catalog = Arc::new(catalog());
        (wire(catalog.clone()), catalog)
    }

    /// Services wired to a fixture catalog behind a [`CountingBackend`].
    pub fn counting_services() -> (Services, Arc<CountingBackend>) {
        let backend = Arc::new(CountingBackend::new(catalog()));
        (wire(backend.clone()), backend)
    }

    /// A registry with every builtin cell type.
    pub fn registry() -> CellRegistry {
        match CellRegistry::with_builtins() {
            Ok(registry) => registry,
            Err(e) => panic!("builtin registration failed: {e}"),
        }
    }

    /// Add `count` contacts (ids from 1000) with an owner, two languages,
    /// custom values, an employer and an acquaintance. Returns the contacts
    /// in id order.
    pub fn populate_contacts(catalog: &InMemoryCatalog, count: usize) -> Vec<Record> {
        let mut contacts = Vec::with_capacity(count);
        for n in 0..count {
            let id = 1000 + n as RecordId;
            let record = Record::new(id, CONTACT, format!("Contact {n}"))
                .with("first_name", format!("First{n}"))
                .with("last_name", format!("Last{n}"))
                .with_ref("owner", Some(100))
                .with_refs("languages", vec![200, 201]);
            catalog.add_record(record.clone());
            catalog.set_custom_value(BOUNTY, id, Value::Int(n as i64 * 1000));
            catalog.set_custom_value(HOBBIES, id, Value::IntList(vec![10, 11]));
            catalog.relate(id, "employed_by", BEBOP);
            catalog.relate(id, "knows", if n % 2 == 0 { 100 } else { 301 });
            contacts.push(record);
        }
        contacts
    }

    pub fn viewer() -> Viewer {
        Viewer::new(Uuid::new_v4())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies over the fixture schema.

    use super::*;
    use proptest::prelude::*;

    /// Regular field paths that resolve on contacts.
    pub const CONTACT_PATHS: &[&str] = &[
        "first_name",
        "last_name",
        "description",
        "email",
        "owner",
        "owner__name",
        "languages",
        "languages__code",
    ];

    /// Keys of every buildable contact cell, across all builtin types.
    pub const CONTACT_KEYS: &[&str] = &[
        "regular_field-first_name",
        "regular_field-last_name",
        "regular_field-description",
        "regular_field-email",
        "regular_field-owner",
        "regular_field-owner__name",
        "regular_field-languages",
        "regular_field-languages__code",
        "custom_field-1",
        "custom_field-2",
        "function_field-full_name",
        "relation-employed_by",
        "relation-knows",
        "volatile-initials",
        "actions-all",
        "actions-view,edit",
    ];

    /// Generate a resolvable contact path.
    pub fn arb_contact_path() -> impl Strategy<Value = &'static str> {
        prop::sample::select(CONTACT_PATHS)
    }

    /// Generate a buildable contact cell key.
    pub fn arb_contact_key() -> impl Strategy<Value = &'static str> {
        prop::sample::select(CONTACT_KEYS)
    }

    /// Generate an ordered list of distinct contact cell keys.
    pub fn arb_contact_keys(max: usize) -> impl Strategy<Value = Vec<&'static str>> {
        prop::sample::subsequence(CONTACT_KEYS, 0..=max.min(CONTACT_KEYS.len()))
            .prop_shuffle()
    }

    /// Generate a key that no builtin factory accepts.
    pub fn arb_unknown_key() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{3,8}".prop_map(|s| format!("nosuchtype-{s}")),
            "[a-z]{3,8}".prop_map(|s| format!("regular_field-zz_{s}")),
            (1000i64..9999).prop_map(|id| format!("custom_field-{id}")),
            "[a-z_]{3,12}",
        ]
    }

    /// Generate a RenderTag variant.
    pub fn arb_render_tag() -> impl Strategy<Value = RenderTag> {
        prop_oneof![
            Just(RenderTag::Detail),
            Just(RenderTag::ListRow),
            Just(RenderTag::EditForm),
            Just(RenderTag::PlainText),
        ]
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for COLONNADE-specific validation.

    use super::*;

    /// Assert that a ColonnadeResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &ColonnadeResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a ColonnadeResult is a NotFound storage error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &ColonnadeResult<T>) {
        match result {
            Err(ColonnadeError::Storage(StorageError::NotFound { .. })) => {}
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    /// Assert that a ColonnadeResult is a Conflict storage error.
    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &ColonnadeResult<T>) {
        match result {
            Err(ColonnadeError::Storage(StorageError::Conflict { .. })) => {}
            other => panic!("Expected Conflict error, got: {:?}", other),
        }
    }

    /// Assert that a ColonnadeResult is a Deletion error.
    #[track_caller]
    pub fn assert_deletion_refused<T: std::fmt::Debug>(result: &ColonnadeResult<T>) {
        match result {
            Err(ColonnadeError::Deletion(_)) => {}
            other => panic!("Expected Deletion error, got: {:?}", other),
        }
    }

    /// Assert that cells carry exactly the given keys, in order.
    #[track_caller]
    pub fn assert_keys(cells: &[Cell], expected: &[&str]) {
        let keys: Vec<String> = cells.iter().map(Cell::key).collect();
        assert_eq!(keys, expected, "cell keys differ");
    }

    /// Assert that a submission was rejected at exactly the given indexes.
    #[track_caller]
    pub fn assert_rejected_at(result: &Result<Vec<Cell>, SubmissionError>, indexes: &[usize]) {
        match result {
            Err(e) => {
                let got: Vec<usize> = e.entries.iter().map(|entry| entry.index).collect();
                assert_eq!(got, indexes, "rejected entries differ");
            }
            Ok(cells) => panic!("Expected rejected submission, got {} cells", cells.len()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
