//! Record-type reflection: field kinds, field descriptors, the catalog trait.

use crate::RecordTypeId;
use serde::{Deserialize, Serialize};

/// Declared data kind of a record attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    LargeText,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Email,
    Url,
    /// Reference to at most one record of `target`.
    ToOne(RecordTypeId),
    /// Reference to any number of records of `target`.
    ToMany(RecordTypeId),
}

/// Payload-free discriminant of [`FieldKind`], used as a formatter table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindTag {
    Text,
    LargeText,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Email,
    Url,
    ToOne,
    ToMany,
}

impl FieldKind {
    pub fn tag(&self) -> KindTag {
        match self {
            Self::Text => KindTag::Text,
            Self::LargeText => KindTag::LargeText,
            Self::Integer => KindTag::Integer,
            Self::Decimal => KindTag::Decimal,
            Self::Boolean => KindTag::Boolean,
            Self::Date => KindTag::Date,
            Self::DateTime => KindTag::DateTime,
            Self::Email => KindTag::Email,
            Self::Url => KindTag::Url,
            Self::ToOne(_) => KindTag::ToOne,
            Self::ToMany(_) => KindTag::ToMany,
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Self::ToOne(_) | Self::ToMany(_))
    }

    /// Record type on the other side of a relation.
    pub fn target(&self) -> Option<&RecordTypeId> {
        match self {
            Self::ToOne(target) | Self::ToMany(target) => Some(target),
            _ => None,
        }
    }
}

/// Reflection data for one attribute of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub verbose_name: String,
    pub kind: FieldKind,
    pub nullable: bool,
    /// Enumerable choices as (stored value, label) pairs.
    pub choices: Option<Vec<(String, String)>>,
    /// Schema-level flag; non-viewable fields can never be used in a cell.
    pub viewable: bool,
    /// Logically retired attribute, kept for backward compatibility.
    pub retired: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, verbose_name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            verbose_name: verbose_name.into(),
            kind,
            nullable: true,
            choices: None,
            viewable: true,
            retired: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_choices<I, K, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.choices = Some(
            choices
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn not_viewable(mut self) -> Self {
        self.viewable = false;
        self
    }

    pub fn retired(mut self) -> Self {
        self.retired = true;
        self
    }

    pub fn has_choices(&self) -> bool {
        self.choices.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Reflection data for a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTypeDescriptor {
    pub id: RecordTypeId,
    pub verbose_name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordTypeDescriptor {
    pub fn new(id: impl Into<RecordTypeId>, verbose_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verbose_name: verbose_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl From<String> for RecordTypeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Record-type reflection service.
pub trait SchemaCatalog: Send + Sync {
    /// Describe a record type, or None when it is unknown.
    fn record_type(&self, id: &RecordTypeId) -> Option<RecordTypeDescriptor>;

    /// Describe one attribute of a record type.
    fn field(&self, record_type: &RecordTypeId, name: &str) -> Option<FieldDescriptor> {
        self.record_type(record_type)
            .and_then(|rt| rt.get(name).cloned())
    }
}
