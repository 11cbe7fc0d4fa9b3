//! Record values as seen by cells.

use crate::{RecordId, RecordTypeId, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(Timestamp),
    /// To-one reference by local id.
    Ref(RecordId),
    /// To-many references by local id, in storage order.
    Refs(Vec<RecordId>),
    /// Several integers, e.g. the selected options of a multi-choice
    /// custom field.
    IntList(Vec<i64>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::Refs(ids) => ids.is_empty(),
            Self::IntList(ids) => ids.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// A record handed to cells by the storage engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub uuid: Uuid,
    pub record_type: RecordTypeId,
    /// Human label (the record's own string form).
    pub label: String,
    pub values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(
        id: RecordId,
        record_type: impl Into<RecordTypeId>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            record_type: record_type.into(),
            label: label.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn with_ref(self, field: impl Into<String>, target: Option<RecordId>) -> Self {
        let value = target.map_or(Value::Null, Value::Ref);
        self.with(field, value)
    }

    pub fn with_refs(self, field: impl Into<String>, targets: Vec<RecordId>) -> Self {
        self.with(field, Value::Refs(targets))
    }

    /// Value of an attribute; missing attributes read as `Null`.
    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_reads_as_null() {
        let record = Record::new(1, "persons.contact", "Spike");
        assert_eq!(record.get("nope"), &Value::Null);
        assert!(record.get("nope").is_null());
    }

    #[test]
    fn test_empty_text_is_null() {
        assert!(Value::from("").is_null());
        assert!(!Value::from("x").is_null());
        assert!(!Value::Int(0).is_null());
    }

    #[test]
    fn test_with_ref_none_is_null() {
        let record = Record::new(1, "persons.contact", "Spike").with_ref("image", None);
        assert_eq!(record.get("image"), &Value::Null);
    }
}
