//! `regular_field`: a plain attribute or a chain of attributes across
//! relations, e.g. `owner__name`.

use super::{Cell, CellKind, CellParts};
use crate::prefetch::related_ids;
use crate::{
    CellError, CellFactory, CompiledPath, FieldKind, FieldPath, Record, RecordId, RecordTypeId,
    RenderSession, RenderTag, Services, Viewer,
};
use once_cell::sync::OnceCell;
use std::any::Any;

pub const TYPE_ID: &str = "regular_field";

/// Variant state: the resolved path and one compiled printer per context.
pub struct RegularFieldCell {
    path: FieldPath,
    compiled: [OnceCell<CompiledPath>; 4],
}

impl RegularFieldCell {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// True when the last step is a relation (to-one or to-many).
    pub fn is_relation_terminated(&self) -> bool {
        self.path.last().field.kind.is_relation()
    }

    pub fn is_to_many_terminated(&self) -> bool {
        matches!(self.path.last().field.kind, FieldKind::ToMany(_))
    }
}

impl CellKind for RegularFieldCell {
    fn render(
        &self,
        _cell: &Cell,
        record: &Record,
        viewer: &Viewer,
        tag: RenderTag,
        session: &RenderSession<'_>,
    ) -> String {
        let compiled = self.compiled[tag.index()]
            .get_or_init(|| session.services().printers.compile(tag, &self.path));
        compiled.render(record, viewer, session)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct RegularFieldFactory;

impl CellFactory for RegularFieldFactory {
    fn type_id(&self) -> &'static str {
        TYPE_ID
    }

    fn build(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        value: &str,
    ) -> Result<Cell, CellError> {
        let path = FieldPath::resolve(services.schema.as_ref(), record_type, value)?;
        let excluded = path.is_hidden_by(services.visibility.as_ref()) || path.is_retired();

        let parts = CellParts {
            type_id: TYPE_ID,
            record_type: record_type.clone(),
            value: value.to_string(),
            title: path.verbose_name(),
            excluded,
            multiline: path.is_multiline(),
        };
        Ok(Cell::from_parts(
            parts,
            RegularFieldCell {
                path,
                compiled: Default::default(),
            },
        ))
    }

    /// Walk every path level by level, fetching the related records of one
    /// depth for all cells and all records in a single call.
    fn populate(
        &self,
        cells: &[&Cell],
        records: &[Record],
        _viewer: &Viewer,
        session: &RenderSession<'_>,
    ) {
        let paths: Vec<&FieldPath> = cells
            .iter()
            .filter_map(|c| c.kind::<RegularFieldCell>())
            .map(RegularFieldCell::path)
            .collect();
        let depth = paths.iter().map(|p| p.len()).max().unwrap_or(0);

        // None means "the batch itself".
        let mut frontiers: Vec<Option<Vec<RecordId>>> = vec![None; paths.len()];

        for level in 0..depth {
            let mut wanted = Vec::new();
            let mut next = Vec::with_capacity(paths.len());

            for (path, frontier) in paths.iter().zip(&frontiers) {
                let step = match path.steps().get(level) {
                    Some(step) if step.field.kind.is_relation() => step,
                    _ => {
                        next.push(Some(Vec::new()));
                        continue;
                    }
                };
                let ids: Vec<RecordId> = match frontier {
                    None => records
                        .iter()
                        .flat_map(|r| related_ids(r, &step.field.name))
                        .collect(),
                    Some(ids) => session
                        .cached_records(ids)
                        .iter()
                        .flat_map(|r| related_ids(r, &step.field.name))
                        .collect(),
                };
                wanted.extend_from_slice(&ids);
                next.push(Some(ids));
            }

            session.warm_records(&wanted);
            frontiers = next;
        }
    }
}
