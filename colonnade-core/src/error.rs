//! Error types for COLONNADE operations

use crate::{Dependent, RecordTypeId};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A cell reference that cannot be turned into a cell.
///
/// Never surfaced to rendering code: the registry converts it into
/// "no cell" plus an error flag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CellError {
    #[error("Unknown cell type: {type_id}")]
    UnknownType { type_id: String },

    #[error("Malformed cell key: {key}")]
    MalformedKey { key: String },

    #[error("Unknown field \"{path}\" on {record_type}")]
    UnknownField {
        record_type: RecordTypeId,
        path: String,
    },

    #[error("Invalid field path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Unknown custom field: {value}")]
    UnknownCustomField { value: String },

    #[error("Custom field {value} does not belong to {record_type}")]
    ForeignCustomField {
        record_type: RecordTypeId,
        value: String,
    },

    #[error("Unknown function field \"{name}\" on {record_type}")]
    UnknownFunction {
        record_type: RecordTypeId,
        name: String,
    },

    #[error("Unknown relation type: {id}")]
    UnknownRelationType { id: String },

    #[error("Relation type {id} is not compatible with {record_type}")]
    IncompatibleRelationType { id: String, record_type: RecordTypeId },

    #[error("Unknown volatile column \"{name}\" on {record_type}")]
    UnknownVolatile {
        record_type: RecordTypeId,
        name: String,
    },

    #[error("Invalid value for {type_id}: {reason}")]
    InvalidValue { type_id: String, reason: String },
}

/// Registry construction errors. Fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate cell type registered: {type_id}")]
    DuplicateType { type_id: String },

    #[error("Invalid cell type id \"{type_id}\": {reason}")]
    InvalidTypeId { type_id: String, reason: String },

    #[error("Global cell registry is already installed")]
    AlreadyInstalled,

    #[error("Global cell registry is not installed")]
    NotInstalled,
}

/// One rejected entry of a user submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEntry {
    /// Position of the entry in the submitted list.
    pub index: usize,
    /// The submitted key, verbatim.
    pub key: String,
    pub reason: String,
}

impl fmt::Display for InvalidEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} \"{}\": {}", self.index, self.key, self.reason)
    }
}

/// Rejection of a whole user-submitted cell list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid cell selection: {}", format_entries(.entries))]
pub struct SubmissionError {
    pub entries: Vec<InvalidEntry>,
}

fn format_entries(entries: &[InvalidEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {kind} {key}")]
    NotFound { kind: &'static str, key: Uuid },

    #[error("Insert failed for {kind}: {reason}")]
    InsertFailed { kind: &'static str, reason: String },

    #[error("Conflict on {kind}: {reason}")]
    Conflict { kind: &'static str, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Protected-deletion violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeletionError {
    #[error("{kind} {key} is the default for its record type and cannot be deleted")]
    NotCustom { kind: &'static str, key: Uuid },

    #[error("{kind} {key} is still referenced by {} dependent(s)", .dependents.len())]
    HasDependents {
        kind: &'static str,
        key: Uuid,
        dependents: Vec<Dependent>,
    },

    #[error("{kind} {key} is already deleted")]
    AlreadyDeleted { kind: &'static str, key: Uuid },
}

/// Edit/visibility rule violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Not editable: {reason}")]
    NotEditable { reason: String },

    #[error("Not visible to viewer {viewer}")]
    NotVisible { viewer: Uuid },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all COLONNADE errors.
#[derive(Debug, Clone, Error)]
pub enum ColonnadeError {
    #[error("Cell error: {0}")]
    Cell(#[from] CellError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Deletion error: {0}")]
    Deletion(#[from] DeletionError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for COLONNADE operations.
pub type ColonnadeResult<T> = Result<T, ColonnadeError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_error_display_unknown_field() {
        let err = CellError::UnknownField {
            record_type: RecordTypeId::new("persons.contact"),
            path: "owner__nope".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("owner__nope"));
        assert!(msg.contains("persons.contact"));
    }

    #[test]
    fn test_submission_error_lists_every_entry() {
        let err = SubmissionError {
            entries: vec![
                InvalidEntry {
                    index: 1,
                    key: "regular_field-nope".to_string(),
                    reason: "unknown field".to_string(),
                },
                InvalidEntry {
                    index: 3,
                    key: "bogus".to_string(),
                    reason: "malformed key".to_string(),
                },
            ],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("#1 \"regular_field-nope\""));
        assert!(msg.contains("#3 \"bogus\": malformed key"));
    }

    #[test]
    fn test_deletion_error_counts_dependents() {
        let err = DeletionError::HasDependents {
            kind: "named view",
            key: Uuid::nil(),
            dependents: vec![
                Dependent::new("report", "Monthly export"),
                Dependent::new("widget", "Home block"),
            ],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("2 dependent(s)"));
    }

    #[test]
    fn test_colonnade_error_from_variants() {
        let registry = ColonnadeError::from(RegistryError::NotInstalled);
        assert!(matches!(registry, ColonnadeError::Registry(_)));

        let storage = ColonnadeError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, ColonnadeError::Storage(_)));

        let cell = ColonnadeError::from(CellError::MalformedKey {
            key: "x".to_string(),
        });
        assert!(matches!(cell, ColonnadeError::Cell(_)));

        let config = ColonnadeError::from(ConfigError::MissingRequired {
            field: "list_row_limit".to_string(),
        });
        assert!(matches!(config, ColonnadeError::Config(_)));
    }
}
