//! Collaborator boundary: the services cells read from.
//!
//! Everything here is owned by the host application. Cells only consume
//! these traits; the bulk methods (`bulk_values`, `bulk_related`, `records`)
//! are what the prefetch coordinator calls once per variant group.

use crate::{
    ActionCatalog, ColonnadeConfig, FunctionFieldRegistry, PrinterRegistry, Record, RecordId,
    RecordTypeId, SchemaCatalog, Value, Viewer, VolatileCatalog,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Administrative hide/show policy for attributes.
pub trait FieldVisibility: Send + Sync {
    fn is_hidden(&self, record_type: &RecordTypeId, field: &str) -> bool;
}

/// Opaque credential evaluation.
pub trait AccessPolicy: Send + Sync {
    fn may_view(&self, viewer: &Viewer, record: &Record) -> bool;

    fn may_change(&self, viewer: &Viewer, record: &Record) -> bool {
        self.may_view(viewer, record)
    }

    fn may_delete(&self, viewer: &Viewer, record: &Record) -> bool {
        self.may_change(viewer, record)
    }
}

/// Data kind of a dynamically-defined attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFieldKind {
    Int,
    Float,
    Bool,
    Str,
    Text,
    Date,
    DateTime,
    Url,
    Enum,
    MultiEnum,
}

/// A dynamically-defined attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    /// Database-local id.
    pub id: i64,
    /// Portable id.
    pub uuid: Uuid,
    pub record_type: RecordTypeId,
    pub name: String,
    pub kind: CustomFieldKind,
    pub deleted: bool,
    /// Options of Enum/MultiEnum fields as (option id, label).
    pub choices: Vec<(i64, String)>,
}

impl CustomField {
    pub fn new(
        id: i64,
        record_type: impl Into<RecordTypeId>,
        name: impl Into<String>,
        kind: CustomFieldKind,
    ) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            record_type: record_type.into(),
            name: name.into(),
            kind,
            deleted: false,
            choices: Vec::new(),
        }
    }

    pub fn choice_label(&self, option: i64) -> Option<&str> {
        self.choices
            .iter()
            .find(|(id, _)| *id == option)
            .map(|(_, label)| label.as_str())
    }
}

/// Dynamic-attribute store.
pub trait CustomFieldStore: Send + Sync {
    /// Enumerate the custom fields of a record type (deleted ones included).
    fn custom_fields(&self, record_type: &RecordTypeId) -> Vec<CustomField>;

    fn custom_field_by_id(&self, id: i64) -> Option<CustomField>;

    fn custom_field_by_uuid(&self, uuid: Uuid) -> Option<CustomField>;

    /// Values of every given field for every given record, in one fetch.
    /// Absent keys mean "no value".
    fn bulk_values(&self, fields: &[i64], records: &[RecordId]) -> HashMap<(i64, RecordId), Value>;
}

/// A graph relationship type between records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationType {
    pub id: String,
    pub predicate: String,
    /// Allowed subject record types; empty means any.
    pub subject_types: Vec<RecordTypeId>,
    /// Allowed object record types; empty means any.
    pub object_types: Vec<RecordTypeId>,
    pub enabled: bool,
}

impl RelationType {
    pub fn new(id: impl Into<String>, predicate: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            predicate: predicate.into(),
            subject_types: Vec::new(),
            object_types: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_subjects(mut self, types: impl IntoIterator<Item = RecordTypeId>) -> Self {
        self.subject_types.extend(types);
        self
    }

    pub fn with_objects(mut self, types: impl IntoIterator<Item = RecordTypeId>) -> Self {
        self.object_types.extend(types);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn accepts_subject(&self, record_type: &RecordTypeId) -> bool {
        self.subject_types.is_empty() || self.subject_types.contains(record_type)
    }
}

/// Relationship store.
pub trait RelationStore: Send + Sync {
    fn relation_type(&self, id: &str) -> Option<RelationType>;

    /// Objects related to each subject through each relation type, in one
    /// fetch. Absent keys mean "no related record".
    fn bulk_related(
        &self,
        relation_types: &[String],
        subjects: &[RecordId],
    ) -> HashMap<(String, RecordId), Vec<Record>>;
}

/// Record storage engine, reduced to what cells need.
pub trait RecordStore: Send + Sync {
    /// Fetch records by local id in one call. Unknown ids are skipped.
    fn records(&self, ids: &[RecordId]) -> Vec<Record>;
}

/// Everything a cell needs from the outside world.
#[derive(Clone)]
pub struct Services {
    pub schema: Arc<dyn SchemaCatalog>,
    pub visibility: Arc<dyn FieldVisibility>,
    pub access: Arc<dyn AccessPolicy>,
    pub custom_fields: Arc<dyn CustomFieldStore>,
    pub relations: Arc<dyn RelationStore>,
    pub records: Arc<dyn RecordStore>,
    pub functions: Arc<FunctionFieldRegistry>,
    pub volatiles: Arc<VolatileCatalog>,
    pub actions: Arc<ActionCatalog>,
    pub printers: Arc<PrinterRegistry>,
    pub config: Arc<ColonnadeConfig>,
}

impl Services {
    /// Wire every collaborator to one backend implementing all of them.
    pub fn from_backend<B>(backend: Arc<B>, config: ColonnadeConfig) -> Self
    where
        B: SchemaCatalog
            + FieldVisibility
            + AccessPolicy
            + CustomFieldStore
            + RelationStore
            + RecordStore
            + 'static,
    {
        let printers = PrinterRegistry::new(&config);
        Self {
            schema: backend.clone(),
            visibility: backend.clone(),
            access: backend.clone(),
            custom_fields: backend.clone(),
            relations: backend.clone(),
            records: backend,
            functions: Arc::new(FunctionFieldRegistry::default()),
            volatiles: Arc::new(VolatileCatalog::default()),
            actions: Arc::new(ActionCatalog::default()),
            printers: Arc::new(printers),
            config: Arc::new(config),
        }
    }

    pub fn with_functions(mut self, functions: FunctionFieldRegistry) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    pub fn with_volatiles(mut self, volatiles: VolatileCatalog) -> Self {
        self.volatiles = Arc::new(volatiles);
        self
    }

    pub fn with_actions(mut self, actions: ActionCatalog) -> Self {
        self.actions = Arc::new(actions);
        self
    }

    pub fn with_printers(mut self, printers: PrinterRegistry) -> Self {
        self.printers = Arc::new(printers);
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
