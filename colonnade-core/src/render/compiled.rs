//! A field path bound to the formatters of one render context.

use super::table::{FormatInput, Formatter, PrinterTable};
use super::RecordLookup;
use crate::{FieldKind, FieldPath, PathStep, Record, Value, Viewer};
use std::sync::Arc;

/// Compiled printer for an accessor path in one context.
///
/// Single-step paths apply the resolved formatter directly. Longer paths
/// follow the first step to the related record(s) and delegate the rest of
/// the path to a nested compiled printer.
pub struct CompiledPath {
    step: PathStep,
    /// Used when this is the terminal step.
    formatter: Formatter,
    rest: Option<Box<CompiledPath>>,
    table: Arc<PrinterTable>,
}

impl CompiledPath {
    pub fn compile(table: &Arc<PrinterTable>, path: &FieldPath) -> Self {
        Self::compile_steps(table, path.steps())
    }

    fn compile_steps(table: &Arc<PrinterTable>, steps: &[PathStep]) -> Self {
        let step = steps[0].clone();
        let formatter = table.formatter_for(&step.owner, &step.field);
        let rest = (steps.len() > 1).then(|| Box::new(Self::compile_steps(table, &steps[1..])));

        Self {
            step,
            formatter,
            rest,
            table: table.clone(),
        }
    }

    pub fn render(&self, record: &Record, viewer: &Viewer, lookup: &dyn RecordLookup) -> String {
        let value = record.get(&self.step.field.name);

        let Some(rest) = &self.rest else {
            return (self.formatter)(&FormatInput {
                value,
                record,
                field: &self.step.field,
                viewer,
                lookup,
                table: &self.table,
            });
        };

        match (&self.step.field.kind, value) {
            (FieldKind::ToOne(_), Value::Ref(id)) => {
                // A dangling reference renders like an empty one.
                let Some(related) = lookup.record(*id) else {
                    return String::new();
                };
                if !lookup.may_view(viewer, &related) {
                    return self.table.text(self.table.hidden_placeholder());
                }
                rest.render(&related, viewer, lookup)
            }
            (FieldKind::ToMany(_), Value::Refs(ids)) => {
                let items = lookup
                    .records(ids)
                    .iter()
                    .map(|related| {
                        if lookup.may_view(viewer, related) {
                            rest.render(related, viewer, lookup)
                        } else {
                            self.table.text(self.table.hidden_placeholder())
                        }
                    })
                    .collect();
                self.table.join(items)
            }
            // Absent first segment.
            _ => String::new(),
        }
    }
}

impl std::fmt::Debug for CompiledPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPath")
            .field("field", &self.step.field.name)
            .field("rest", &self.rest)
            .finish()
    }
}
