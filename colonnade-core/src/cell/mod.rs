//! Cells: typed accessors for one column of a record listing.
//!
//! A [`Cell`] carries the state shared by every variant (discriminator,
//! record type, raw reference, flags) and delegates variant behavior to a
//! [`CellKind`]. Cells are built by a registered factory only; see
//! [`crate::CellRegistry`].

pub mod actions;
pub mod custom;
pub mod function;
pub mod regular;
pub mod relation;
pub mod volatile;

use crate::{Record, RecordTypeId, RenderSession, RenderTag, Viewer};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Separator between discriminator and value in a compact key.
pub const KEY_SEPARATOR: char = '-';

/// Serialized form of a cell: `{"type": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellDict {
    #[serde(rename = "type")]
    pub type_id: String,
    pub value: String,
}

impl CellDict {
    pub fn new(type_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            value: value.into(),
        }
    }
}

/// Variant-specific behavior of a cell.
pub trait CellKind: Send + Sync + 'static {
    /// Value used when the serialized form must survive a copy to another
    /// database. None means the local value is already portable.
    fn portable_value(&self) -> Option<String> {
        None
    }

    /// Render the value of this cell for `record`.
    fn render(
        &self,
        cell: &Cell,
        record: &Record,
        viewer: &Viewer,
        tag: RenderTag,
        session: &RenderSession<'_>,
    ) -> String;

    fn as_any(&self) -> &dyn Any;
}

/// Construction parameters for a [`Cell`]. Used by cell factories.
#[derive(Debug, Clone)]
pub struct CellParts {
    pub type_id: &'static str,
    pub record_type: RecordTypeId,
    pub value: String,
    pub title: String,
    pub excluded: bool,
    pub multiline: bool,
}

/// One column over records of a given type.
#[derive(Clone)]
pub struct Cell {
    type_id: &'static str,
    record_type: RecordTypeId,
    value: String,
    title: String,
    hidden: bool,
    excluded: bool,
    multiline: bool,
    kind: Arc<dyn CellKind>,
}

impl Cell {
    /// Assemble a cell. Meant for [`crate::CellFactory`] implementations;
    /// everything else goes through the registry.
    pub fn from_parts(parts: CellParts, kind: impl CellKind) -> Self {
        Self {
            type_id: parts.type_id,
            record_type: parts.record_type,
            value: parts.value,
            title: parts.title,
            hidden: false,
            excluded: parts.excluded,
            multiline: parts.multiline,
            kind: Arc::new(kind),
        }
    }

    pub fn type_id(&self) -> &'static str {
        self.type_id
    }

    pub fn record_type(&self) -> &RecordTypeId {
        &self.record_type
    }

    /// Local raw reference.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn portable_value(&self) -> String {
        self.kind
            .portable_value()
            .unwrap_or_else(|| self.value.clone())
    }

    /// Compact key `"<type>-<value>"`, unique within one selectable list.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.type_id, KEY_SEPARATOR, self.value)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// The only mutation allowed after construction.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Kept for backward compatibility but skipped by consumers.
    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    pub fn is_multiline(&self) -> bool {
        self.multiline
    }

    pub fn to_dict(&self, portable: bool) -> CellDict {
        let value = if portable {
            self.portable_value()
        } else {
            self.value.clone()
        };
        CellDict::new(self.type_id, value)
    }

    /// Variant behavior, downcast to a concrete kind.
    pub fn kind<K: CellKind>(&self) -> Option<&K> {
        self.kind.as_any().downcast_ref::<K>()
    }

    /// Render for `record`. Excluded cells render nothing, and hidden
    /// cells render nothing in interactive contexts.
    pub fn render(
        &self,
        record: &Record,
        viewer: &Viewer,
        tag: RenderTag,
        session: &RenderSession<'_>,
    ) -> String {
        if self.excluded || (self.hidden && tag.is_interactive()) {
            return String::new();
        }
        self.kind.render(self, record, viewer, tag, session)
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
            && self.record_type == other.record_type
            && self.value == other.value
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("type_id", &self.type_id)
            .field("record_type", &self.record_type)
            .field("value", &self.value)
            .field("hidden", &self.hidden)
            .field("excluded", &self.excluded)
            .finish()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}
