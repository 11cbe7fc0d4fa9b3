//! Render dispatch: one formatter table per rendering context.

mod builtins;
mod compiled;
pub mod html;
mod join;
mod table;

pub use builtins::{display_value, fallback};
pub use compiled::CompiledPath;
pub use join::JoinPolicy;
pub use table::{ChoiceFormatterBuilder, FormatInput, Formatter, PrinterTable};

use crate::{ColonnadeConfig, FieldPath, Record, RecordId, Viewer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Target presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderTag {
    Detail,
    ListRow,
    EditForm,
    PlainText,
}

impl RenderTag {
    pub const ALL: [RenderTag; 4] = [
        RenderTag::Detail,
        RenderTag::ListRow,
        RenderTag::EditForm,
        RenderTag::PlainText,
    ];

    /// Dense index, for per-context arrays.
    pub const fn index(self) -> usize {
        match self {
            Self::Detail => 0,
            Self::ListRow => 1,
            Self::EditForm => 2,
            Self::PlainText => 3,
        }
    }

    pub const fn is_html(self) -> bool {
        !matches!(self, Self::PlainText)
    }

    /// Interactive contexts suppress hidden cells.
    pub const fn is_interactive(self) -> bool {
        !matches!(self, Self::PlainText)
    }
}

/// Read access to related records while rendering.
pub trait RecordLookup {
    fn record(&self, id: RecordId) -> Option<Record>;

    /// Records in the order of `ids`; unknown ids are skipped.
    fn records(&self, ids: &[RecordId]) -> Vec<Record>;

    fn may_view(&self, viewer: &Viewer, record: &Record) -> bool;
}

/// The set of printer tables, one per [`RenderTag`].
#[derive(Debug, Clone)]
pub struct PrinterRegistry {
    tables: [Arc<PrinterTable>; 4],
}

impl PrinterRegistry {
    /// Standard tables configured from `config`.
    pub fn new(config: &ColonnadeConfig) -> Self {
        let build = |tag: RenderTag| {
            let join = match tag {
                RenderTag::Detail => JoinPolicy::bullets(None),
                RenderTag::ListRow => JoinPolicy::bullets(Some(config.list_row_limit)),
                RenderTag::EditForm => JoinPolicy::separator(config.form_separator.clone()),
                RenderTag::PlainText => JoinPolicy::separator(config.plain_text_separator.clone()),
            };
            let mut table =
                PrinterTable::new(tag, fallback(), join, config.hidden_placeholder.clone());
            builtins::install(&mut table);
            Arc::new(table)
        };

        Self {
            tables: RenderTag::ALL.map(build),
        }
    }

    pub fn table(&self, tag: RenderTag) -> &Arc<PrinterTable> {
        &self.tables[tag.index()]
    }

    /// Mutable access for startup customization (overrides, join policies).
    pub fn table_mut(&mut self, tag: RenderTag) -> &mut PrinterTable {
        Arc::make_mut(&mut self.tables[tag.index()])
    }

    /// Bind an accessor path to the formatters of one context.
    pub fn compile(&self, tag: RenderTag, path: &FieldPath) -> CompiledPath {
        CompiledPath::compile(self.table(tag), path)
    }
}

impl Default for PrinterRegistry {
    fn default() -> Self {
        Self::new(&ColonnadeConfig::default())
    }
}
