//! `volatile`: a pseudo column rendered by code, with no stored value.

use super::{Cell, CellKind, CellParts};
use crate::{
    CellError, CellFactory, Record, RecordTypeId, RenderSession, RenderTag, Services, Viewer,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

pub const TYPE_ID: &str = "volatile";

type RenderFn = dyn Fn(&Record, &Viewer, RenderTag) -> String + Send + Sync;

/// A named code-defined renderer. Its output is used verbatim, so it is
/// responsible for escaping in HTML contexts.
#[derive(Clone)]
pub struct VolatileColumn {
    pub name: String,
    pub title: String,
    render: Arc<RenderFn>,
}

impl VolatileColumn {
    pub fn new<F>(name: impl Into<String>, title: impl Into<String>, render: F) -> Self
    where
        F: Fn(&Record, &Viewer, RenderTag) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            title: title.into(),
            render: Arc::new(render),
        }
    }

    pub fn render(&self, record: &Record, viewer: &Viewer, tag: RenderTag) -> String {
        (self.render)(record, viewer, tag)
    }
}

impl std::fmt::Debug for VolatileColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolatileColumn")
            .field("name", &self.name)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// Volatile columns per record type.
#[derive(Debug, Default)]
pub struct VolatileCatalog {
    columns: HashMap<RecordTypeId, HashMap<String, VolatileColumn>>,
}

impl VolatileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, record_type: RecordTypeId, column: VolatileColumn) -> &mut Self {
        self.columns
            .entry(record_type)
            .or_default()
            .insert(column.name.clone(), column);
        self
    }

    pub fn get(&self, record_type: &RecordTypeId, name: &str) -> Option<&VolatileColumn> {
        self.columns.get(record_type)?.get(name)
    }
}

pub struct VolatileCell {
    column: VolatileColumn,
}

impl CellKind for VolatileCell {
    fn render(
        &self,
        _cell: &Cell,
        record: &Record,
        viewer: &Viewer,
        tag: RenderTag,
        _session: &RenderSession<'_>,
    ) -> String {
        self.column.render(record, viewer, tag)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct VolatileFactory;

impl CellFactory for VolatileFactory {
    fn type_id(&self) -> &'static str {
        TYPE_ID
    }

    fn build(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        value: &str,
    ) -> Result<Cell, CellError> {
        let column = services
            .volatiles
            .get(record_type, value)
            .cloned()
            .ok_or_else(|| CellError::UnknownVolatile {
                record_type: record_type.clone(),
                name: value.to_string(),
            })?;

        let parts = CellParts {
            type_id: TYPE_ID,
            record_type: record_type.clone(),
            value: value.to_string(),
            title: column.title.clone(),
            excluded: false,
            multiline: false,
        };
        Ok(Cell::from_parts(parts, VolatileCell { column }))
    }
}
