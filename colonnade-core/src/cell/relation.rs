//! `relation`: the records linked to a record through a relation type.

use super::{Cell, CellKind, CellParts};
use crate::{
    CellError, CellFactory, Record, RecordLookup, RecordTypeId, RelationType, RenderSession,
    RenderTag, Services, Viewer,
};
use std::any::Any;

pub const TYPE_ID: &str = "relation";

pub struct RelationCell {
    relation_type: RelationType,
}

impl RelationCell {
    pub fn relation_type(&self) -> &RelationType {
        &self.relation_type
    }
}

impl CellKind for RelationCell {
    fn render(
        &self,
        _cell: &Cell,
        record: &Record,
        viewer: &Viewer,
        tag: RenderTag,
        session: &RenderSession<'_>,
    ) -> String {
        let table = session.services().printers.table(tag);
        let labels = session
            .related(&self.relation_type.id, record.id)
            .iter()
            .map(|object| table.related_label(object, session.may_view(viewer, object)))
            .collect();
        table.join(labels)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct RelationFactory;

impl CellFactory for RelationFactory {
    fn type_id(&self) -> &'static str {
        TYPE_ID
    }

    fn build(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        value: &str,
    ) -> Result<Cell, CellError> {
        let relation_type =
            services
                .relations
                .relation_type(value)
                .ok_or_else(|| CellError::UnknownRelationType {
                    id: value.to_string(),
                })?;
        if !relation_type.accepts_subject(record_type) {
            return Err(CellError::IncompatibleRelationType {
                id: value.to_string(),
                record_type: record_type.clone(),
            });
        }

        let parts = CellParts {
            type_id: TYPE_ID,
            record_type: record_type.clone(),
            value: value.to_string(),
            title: relation_type.predicate.clone(),
            excluded: !relation_type.enabled,
            multiline: true,
        };
        Ok(Cell::from_parts(parts, RelationCell { relation_type }))
    }

    /// One fetch for every relation type of the group and every record.
    fn populate(
        &self,
        cells: &[&Cell],
        records: &[Record],
        _viewer: &Viewer,
        session: &RenderSession<'_>,
    ) {
        let mut types: Vec<String> = cells
            .iter()
            .filter_map(|c| c.kind::<RelationCell>())
            .map(|k| k.relation_type.id.clone())
            .collect();
        types.sort();
        types.dedup();

        let subjects: Vec<_> = records.iter().map(|r| r.id).collect();
        session.warm_related(&types, &subjects);
    }
}
