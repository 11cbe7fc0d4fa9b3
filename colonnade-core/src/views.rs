//! Cell-set persistence entities: named views and search profiles.
//!
//! Both own one ordered cell list, stored in its serialized form and
//! decoded lazily on first read. Decoding never writes: a stale list is
//! reported dirty and fixed by an explicit [`CellSetEntity::repair`].

use crate::cell::{custom, regular::RegularFieldCell};
use crate::cell_list::{decode, encode};
use crate::{
    new_portable_key, Cell, CellDict, CellError, CellList, CellRegistry, ColonnadeConfig,
    ColonnadeResult, DecodedCells, DeletionError, Owner, PermissionError, RecordTypeId, Services,
    StorageError, Viewer,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// SHARED TYPES
// ============================================================================

/// Lifecycle of a persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// In memory only.
    Draft,
    Persisted,
    /// Terminal.
    Deleted,
}

/// Something that references an entity by its portable key and blocks its
/// deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependent {
    pub kind: String,
    pub label: String,
}

impl Dependent {
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
        }
    }
}

/// Identity, ownership and visibility common to both entity kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Assigned on persist.
    pub id: Option<i64>,
    /// Portable key.
    pub uuid: Uuid,
    pub name: String,
    pub record_type: RecordTypeId,
    pub owner: Option<Owner>,
    pub is_private: bool,
    /// Non-custom entities are the per-type fallback default.
    pub is_custom: bool,
    pub state: EntityState,
}

impl EntityMeta {
    pub fn new(name: impl Into<String>, record_type: impl Into<RecordTypeId>) -> Self {
        Self {
            id: None,
            uuid: new_portable_key(),
            name: name.into(),
            record_type: record_type.into(),
            owner: None,
            is_private: false,
            is_custom: true,
            state: EntityState::Draft,
        }
    }
}

/// Stored cell list plus its lazily decoded form.
#[derive(Debug, Clone, Default)]
pub struct CellSet {
    stored: String,
    decoded: OnceCell<DecodedCells>,
}

impl CellSet {
    pub fn from_stored(stored: impl Into<String>) -> Self {
        Self {
            stored: stored.into(),
            decoded: OnceCell::new(),
        }
    }

    /// The persisted layout, as last written.
    pub fn stored(&self) -> &str {
        &self.stored
    }

    pub fn is_loaded(&self) -> bool {
        self.decoded.get().is_some()
    }

    /// Replace the whole list. Stores the local form.
    pub fn replace(&mut self, cells: Vec<Cell>) -> ColonnadeResult<()> {
        self.stored = encode(&cells, false)?;
        self.decoded = OnceCell::with_value(DecodedCells {
            cells: CellList::new(cells),
            dirty: false,
            dropped: 0,
        });
        Ok(())
    }
}

/// Document form of an entity for transport to another database. Cell
/// values are portable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortableCellSet {
    pub kind: String,
    pub uuid: Uuid,
    pub name: String,
    pub record_type: RecordTypeId,
    pub owner: Option<Owner>,
    pub is_private: bool,
    pub is_custom: bool,
    /// Only meaningful for search profiles.
    #[serde(default)]
    pub disabled: bool,
    pub cells: Vec<CellDict>,
}

// ============================================================================
// ENTITY TRAIT
// ============================================================================

/// Behavior shared by the entities that own a cell list.
pub trait CellSetEntity: Clone + Send + Sync + 'static {
    /// Entity kind, used in errors and logs.
    const KIND: &'static str;

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    fn cell_set(&self) -> &CellSet;

    fn cell_set_mut(&mut self) -> &mut CellSet;

    fn from_parts(meta: EntityMeta, cells: CellSet) -> Self;

    /// Whether the entity is switched off. Carried through export.
    fn is_disabled(&self) -> bool {
        false
    }

    fn set_disabled(&mut self, _disabled: bool) {}

    /// Whether this entity kind may hold `cell`.
    fn check_cell(_cell: &Cell) -> Result<(), CellError> {
        Ok(())
    }

    fn uuid(&self) -> Uuid {
        self.meta().uuid
    }

    fn record_type(&self) -> &RecordTypeId {
        &self.meta().record_type
    }

    /// Decode the stored list on first call and cache it on the instance.
    /// Logs one warning when entries had to be dropped.
    fn load_cells(&self, registry: &CellRegistry, services: &Services) -> &DecodedCells {
        let meta = self.meta();
        let set = self.cell_set();
        set.decoded.get_or_init(|| {
            let decoded = decode(registry, services, &meta.record_type, &set.stored);
            let mut dropped = decoded.dropped;
            let mut dirty = decoded.dirty;

            let decoded_len = decoded.cells.len();
            let cells: Vec<Cell> = decoded
                .cells
                .into_cells()
                .into_iter()
                .filter(|c| Self::check_cell(c).is_ok())
                .collect();
            if cells.len() != decoded_len {
                dropped += decoded_len - cells.len();
                dirty = true;
            }

            if dirty {
                warn!(
                    kind = Self::KIND,
                    entity = %meta.name,
                    uuid = %meta.uuid,
                    record_type = %meta.record_type,
                    dropped = dropped,
                    "stored cell list has stale entries"
                );
            }

            DecodedCells {
                cells: CellList::new(cells),
                dirty,
                dropped,
            }
        })
    }

    fn cells(&self, registry: &CellRegistry, services: &Services) -> &CellList {
        &self.load_cells(registry, services).cells
    }

    /// Cells consumers should display.
    fn filtered_cells(&self, registry: &CellRegistry, services: &Services) -> Vec<Cell> {
        self.cells(registry, services).filtered_cells()
    }

    fn needs_repair(&self, registry: &CellRegistry, services: &Services) -> bool {
        self.load_cells(registry, services).dirty
    }

    /// Replace the whole cell list.
    fn set_cells(&mut self, cells: Vec<Cell>) -> ColonnadeResult<()> {
        for cell in &cells {
            if cell.record_type() != self.record_type() {
                return Err(CellError::InvalidValue {
                    type_id: cell.type_id().to_string(),
                    reason: format!(
                        "cell is for {}, not {}",
                        cell.record_type(),
                        self.record_type()
                    ),
                }
                .into());
            }
            Self::check_cell(cell)?;
        }
        self.cell_set_mut().replace(cells)
    }

    /// Rewrite the stored list when decoding dropped entries. Returns
    /// whether anything changed; the caller persists the entity.
    fn repair(&mut self, registry: &CellRegistry, services: &Services) -> ColonnadeResult<bool> {
        let (dirty, cells) = {
            let decoded = self.load_cells(registry, services);
            (decoded.dirty, decoded.cells.cells().to_vec())
        };
        if !dirty {
            return Ok(false);
        }
        self.cell_set_mut().replace(cells)?;
        info!(
            kind = Self::KIND,
            uuid = %self.uuid(),
            "stored cell list repaired"
        );
        Ok(true)
    }

    /// Public entities are visible to everybody; private ones to their
    /// owner (or owning team) and superusers.
    fn can_view(&self, viewer: &Viewer) -> bool {
        let meta = self.meta();
        if !meta.is_private || viewer.is_superuser {
            return true;
        }
        meta.owner.as_ref().is_some_and(|owner| viewer.owns(owner))
    }

    /// [`Self::can_view`] as a result, for callers that propagate errors.
    fn check_visible(&self, viewer: &Viewer) -> Result<(), PermissionError> {
        if self.can_view(viewer) {
            Ok(())
        } else {
            Err(PermissionError::NotVisible { viewer: viewer.id })
        }
    }

    /// Deletion guard. `dependents` are the current referrers of this
    /// entity's portable key.
    fn check_deletable(&self, dependents: &[Dependent]) -> Result<(), DeletionError> {
        let meta = self.meta();
        if meta.state == EntityState::Deleted {
            return Err(DeletionError::AlreadyDeleted {
                kind: Self::KIND,
                key: meta.uuid,
            });
        }
        if !meta.is_custom {
            return Err(DeletionError::NotCustom {
                kind: Self::KIND,
                key: meta.uuid,
            });
        }
        if !dependents.is_empty() {
            return Err(DeletionError::HasDependents {
                kind: Self::KIND,
                key: meta.uuid,
                dependents: dependents.to_vec(),
            });
        }
        Ok(())
    }

    /// Export with portable cell values.
    fn to_portable(
        &self,
        registry: &CellRegistry,
        services: &Services,
    ) -> PortableCellSet {
        let meta = self.meta();
        PortableCellSet {
            kind: Self::KIND.to_string(),
            uuid: meta.uuid,
            name: meta.name.clone(),
            record_type: meta.record_type.clone(),
            owner: meta.owner,
            is_private: meta.is_private,
            is_custom: meta.is_custom,
            disabled: self.is_disabled(),
            cells: self.cells(registry, services).to_dicts(true),
        }
    }

    /// Import an exported document as a new draft. Custom fields are
    /// re-resolved by uuid; entries that do not exist here are dropped.
    fn from_portable(
        doc: PortableCellSet,
        registry: &CellRegistry,
        services: &Services,
    ) -> ColonnadeResult<Self> {
        if doc.kind != Self::KIND {
            return Err(StorageError::Serialization {
                reason: format!("expected a {} document, got {}", Self::KIND, doc.kind),
            }
            .into());
        }

        let (cells, _) = registry.build_many_from_dicts(services, &doc.record_type, &doc.cells);
        let cells: Vec<Cell> = cells
            .into_iter()
            .filter(|c| Self::check_cell(c).is_ok())
            .collect();
        if cells.len() != doc.cells.len() {
            warn!(
                kind = Self::KIND,
                entity = %doc.name,
                dropped = doc.cells.len() - cells.len(),
                "imported cell list has entries unknown to this database"
            );
        }

        let disabled = doc.disabled;
        let meta = EntityMeta {
            id: None,
            uuid: doc.uuid,
            name: doc.name,
            record_type: doc.record_type,
            owner: doc.owner,
            is_private: doc.is_private,
            is_custom: doc.is_custom,
            state: EntityState::Draft,
        };
        let mut set = CellSet::default();
        set.replace(cells)?;
        let mut entity = Self::from_parts(meta, set);
        entity.set_disabled(disabled);
        Ok(entity)
    }
}

// ============================================================================
// NAMED VIEW
// ============================================================================

/// An ordered set of columns for listing records of one type.
#[derive(Debug, Clone)]
pub struct NamedView {
    pub meta: EntityMeta,
    cells: CellSet,
}

impl NamedView {
    pub fn new(name: impl Into<String>, record_type: impl Into<RecordTypeId>) -> Self {
        Self {
            meta: EntityMeta::new(name, record_type),
            cells: CellSet::default(),
        }
    }

    /// The non-custom fallback view of a record type.
    pub fn default_for(record_type: impl Into<RecordTypeId>) -> Self {
        let mut view = Self::new("Default view", record_type);
        view.meta.is_custom = false;
        view
    }

    pub fn owned_by(mut self, owner: Owner) -> Self {
        self.meta.owner = Some(owner);
        self
    }

    pub fn private(mut self) -> Self {
        self.meta.is_private = true;
        self
    }

    /// Edit rule: superusers always; otherwise the owner or a member of
    /// the owning team; ownerless views only when the global policy allows.
    pub fn can_edit(
        &self,
        viewer: &Viewer,
        config: &ColonnadeConfig,
    ) -> Result<(), PermissionError> {
        if viewer.is_superuser {
            return Ok(());
        }
        match &self.meta.owner {
            Some(owner) if viewer.owns(owner) => Ok(()),
            Some(Owner::User(_)) => Err(PermissionError::NotEditable {
                reason: "this view belongs to another user".to_string(),
            }),
            Some(Owner::Team(_)) => Err(PermissionError::NotEditable {
                reason: "this view belongs to a team you are not a member of".to_string(),
            }),
            None if config.allow_shared_view_edition => Ok(()),
            None => Err(PermissionError::NotEditable {
                reason: "only superusers can edit a view without owner".to_string(),
            }),
        }
    }
}

impl CellSetEntity for NamedView {
    const KIND: &'static str = "named view";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn cell_set(&self) -> &CellSet {
        &self.cells
    }

    fn cell_set_mut(&mut self) -> &mut CellSet {
        &mut self.cells
    }

    fn from_parts(meta: EntityMeta, cells: CellSet) -> Self {
        Self { meta, cells }
    }
}

// ============================================================================
// SEARCH PROFILE
// ============================================================================

/// The fields searched for one record type, in priority order.
///
/// Holds only attribute-path and dynamic-attribute cells, and no path
/// ending on a to-many relation.
#[derive(Debug, Clone)]
pub struct SearchProfile {
    pub meta: EntityMeta,
    pub disabled: bool,
    cells: CellSet,
}

impl SearchProfile {
    pub fn new(name: impl Into<String>, record_type: impl Into<RecordTypeId>) -> Self {
        Self {
            meta: EntityMeta::new(name, record_type),
            disabled: false,
            cells: CellSet::default(),
        }
    }

    pub fn default_for(record_type: impl Into<RecordTypeId>) -> Self {
        let mut profile = Self::new("Default search", record_type);
        profile.meta.is_custom = false;
        profile
    }

    pub fn owned_by(mut self, owner: Owner) -> Self {
        self.meta.owner = Some(owner);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Cells to search in. Empty when the profile is disabled.
    pub fn searchable_cells(&self, registry: &CellRegistry, services: &Services) -> Vec<Cell> {
        if self.disabled {
            return Vec::new();
        }
        self.filtered_cells(registry, services)
    }
}

impl CellSetEntity for SearchProfile {
    const KIND: &'static str = "search profile";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn cell_set(&self) -> &CellSet {
        &self.cells
    }

    fn cell_set_mut(&mut self) -> &mut CellSet {
        &mut self.cells
    }

    fn from_parts(meta: EntityMeta, cells: CellSet) -> Self {
        Self {
            meta,
            disabled: false,
            cells,
        }
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    fn check_cell(cell: &Cell) -> Result<(), CellError> {
        let not_searchable = |reason: &str| CellError::InvalidValue {
            type_id: cell.type_id().to_string(),
            reason: reason.to_string(),
        };

        match cell.type_id() {
            custom::TYPE_ID => Ok(()),
            crate::cell::regular::TYPE_ID => match cell.kind::<RegularFieldCell>() {
                Some(kind) if kind.is_to_many_terminated() => {
                    Err(not_searchable("a many-to-many field is not searchable"))
                }
                _ => Ok(()),
            },
            _ => Err(not_searchable("only fields and custom fields are searchable")),
        }
    }
}

/// The profile applying to `viewer` for `record_type`: their own, then
/// one of their teams', then the default. Disabled profiles are skipped.
pub fn select_search_profile<'a>(
    profiles: &'a [SearchProfile],
    record_type: &RecordTypeId,
    viewer: &Viewer,
) -> Option<&'a SearchProfile> {
    let candidates: Vec<&SearchProfile> = profiles
        .iter()
        .filter(|p| &p.meta.record_type == record_type && !p.disabled)
        .collect();

    let by_user = candidates
        .iter()
        .find(|p| p.meta.owner == Some(Owner::User(viewer.id)));
    let by_team = || {
        candidates.iter().find(|p| {
            matches!(p.meta.owner, Some(Owner::Team(team)) if viewer.is_member_of(team))
        })
    };
    let fallback = || candidates.iter().find(|p| !p.meta.is_custom);

    by_user.or_else(by_team).or_else(fallback).copied()
}

// ============================================================================
// TESTS
// ============================================================================
