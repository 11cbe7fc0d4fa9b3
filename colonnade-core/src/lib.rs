//! COLONNADE Core - Cells, Accessor Paths, Rendering and Cell-Set Entities
//!
//! A *cell* describes one column over records of a given type: a plain
//! attribute or a chain of attributes across relations, a dynamic
//! attribute, a computed value, a graph relation, a code-defined pseudo
//! column, or the list of record actions.
//!
//! - [`CellRegistry`] maps discriminators to factories; it is the only way
//!   to build a cell.
//! - [`FieldPath`] resolves `owner__name`-style references.
//! - [`PrinterRegistry`] holds one formatter table per [`RenderTag`].
//! - [`RenderSession`] warms per-variant caches in bulk, then renders.
//! - [`NamedView`] and [`SearchProfile`] own a persisted, ordered cell list.
//!
//! The host application plugs in through the collaborator traits of
//! [`services`]; [`InMemoryCatalog`] implements all of them.

pub mod cell;
pub mod cell_list;
mod config;
mod error;
mod identity;
mod memory;
mod path;
pub mod prefetch;
pub mod registry;
pub mod render;
mod schema;
pub mod services;
mod value;
pub mod views;

#[cfg(test)]
mod test_support;

pub use cell::actions::{ActionCatalog, ActionRequirement, RecordAction};
pub use cell::function::{FunctionField, FunctionFieldRegistry, FunctionOutput, SimpleFunctionField};
pub use cell::volatile::{VolatileCatalog, VolatileColumn};
pub use cell::{Cell, CellDict, CellKind, CellParts, KEY_SEPARATOR};
pub use cell_list::{CellList, DecodedCells};
pub use config::ColonnadeConfig;
pub use error::{
    CellError, ColonnadeError, ColonnadeResult, ConfigError, DeletionError, InvalidEntry,
    PermissionError, RegistryError, StorageError, SubmissionError,
};
pub use identity::{new_portable_key, Owner, RecordId, RecordTypeId, Timestamp, Viewer};
pub use memory::InMemoryCatalog;
pub use path::{FieldPath, PathStep, PATH_SEPARATOR};
pub use prefetch::{PopulateReport, PrefetchCache, RenderSession};
pub use registry::{global, install_global, CellFactory, CellRegistry, CellRegistryBuilder};
pub use render::{
    display_value, CompiledPath, FormatInput, Formatter, JoinPolicy, PrinterRegistry,
    PrinterTable, RecordLookup, RenderTag,
};
pub use schema::{FieldDescriptor, FieldKind, KindTag, RecordTypeDescriptor, SchemaCatalog};
pub use services::{
    AccessPolicy, CustomField, CustomFieldKind, CustomFieldStore, FieldVisibility, RecordStore,
    RelationStore, RelationType, Services,
};
pub use value::{Record, Value};
pub use views::{
    select_search_profile, CellSet, CellSetEntity, Dependent, EntityMeta, EntityState, NamedView,
    PortableCellSet, SearchProfile,
};
