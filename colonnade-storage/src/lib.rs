//! COLONNADE Storage - Storage Trait and Mock Implementation
//!
//! Defines the persistence layer for the entities that own a cell list
//! (named views and search profiles): uniqueness, protected deletion,
//! dependent tracking and the maintenance pass that rewrites stale lists.

use colonnade_core::{
    CellRegistry, CellSet, CellSetEntity, ColonnadeResult, Dependent, EntityState, NamedView,
    RecordTypeId, SearchProfile, Services, StorageError, Viewer,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Storage for one kind of cell-set entity.
///
/// Updates replace the whole entity; concurrent writers follow
/// last-write-wins. Uniqueness violations surface as
/// [`StorageError::Conflict`].
pub trait ViewStorage: Send + Sync {
    type Entity: CellSetEntity;

    /// Persist a draft. Assigns the local id and moves it to `Persisted`.
    fn insert(&self, entity: &mut Self::Entity) -> ColonnadeResult<i64>;

    /// Get an entity by local id.
    fn get(&self, id: i64) -> ColonnadeResult<Option<Self::Entity>>;

    /// Get an entity by portable key.
    fn get_by_uuid(&self, uuid: Uuid) -> ColonnadeResult<Option<Self::Entity>>;

    /// Replace a persisted entity, cell list included.
    fn update(&self, entity: &Self::Entity) -> ColonnadeResult<()>;

    /// Delete an entity, unless it is the non-custom default or something
    /// still references it. Returns the entity in its `Deleted` state.
    fn delete(&self, uuid: Uuid) -> ColonnadeResult<Self::Entity>;

    /// Entities of `record_type` that `viewer` may see, by id.
    fn list_for(
        &self,
        record_type: &RecordTypeId,
        viewer: &Viewer,
    ) -> ColonnadeResult<Vec<Self::Entity>>;

    /// Record that `dependent` references the entity keyed `uuid`.
    fn register_dependent(&self, uuid: Uuid, dependent: Dependent) -> ColonnadeResult<()>;

    /// Drop a reference. Returns whether it was registered.
    fn release_dependent(&self, uuid: Uuid, dependent: &Dependent) -> ColonnadeResult<bool>;

    fn dependents_of(&self, uuid: Uuid) -> ColonnadeResult<Vec<Dependent>>;

    /// Maintenance pass: rewrite every stored cell list with stale entries.
    /// Returns the number of entities repaired.
    fn repair_stale(&self, registry: &CellRegistry, services: &Services) -> ColonnadeResult<usize>;
}

// ============================================================================
// MOCK STORAGE
// ============================================================================

/// In-memory storage for testing and embedding.
///
/// Entities are stored with their cell list in persisted form only, so
/// every read decodes again, as a database round trip would.
#[derive(Debug)]
pub struct MockViewStorage<E> {
    entities: Arc<RwLock<HashMap<Uuid, E>>>,
    dependents: Arc<RwLock<HashMap<Uuid, Vec<Dependent>>>>,
    next_id: Arc<RwLock<i64>>,
}

pub type MockNamedViewStorage = MockViewStorage<NamedView>;
pub type MockSearchProfileStorage = MockViewStorage<SearchProfile>;

impl<E: CellSetEntity> Default for MockViewStorage<E> {
    fn default() -> Self {
        Self {
            entities: Arc::new(RwLock::new(HashMap::new())),
            dependents: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(RwLock::new(1)),
        }
    }
}

impl<E: CellSetEntity> MockViewStorage<E> {
    /// Create a new mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) -> ColonnadeResult<()> {
        write(&self.entities)?.clear();
        write(&self.dependents)?.clear();
        Ok(())
    }

    pub fn len(&self) -> ColonnadeResult<usize> {
        Ok(read(&self.entities)?.len())
    }

    pub fn is_empty(&self) -> ColonnadeResult<bool> {
        Ok(read(&self.entities)?.is_empty())
    }

    /// The raw persisted cell list of an entity.
    pub fn stored_cells(&self, uuid: Uuid) -> ColonnadeResult<Option<String>> {
        Ok(read(&self.entities)?
            .get(&uuid)
            .map(|e| e.cell_set().stored().to_string()))
    }

    fn check_single_default(
        entities: &HashMap<Uuid, E>,
        entity: &E,
    ) -> ColonnadeResult<()> {
        if entity.meta().is_custom {
            return Ok(());
        }
        let taken = entities.values().any(|other| {
            other.uuid() != entity.uuid()
                && !other.meta().is_custom
                && other.record_type() == entity.record_type()
        });
        if taken {
            return Err(StorageError::Conflict {
                kind: E::KIND,
                reason: format!("{} already has a default {}", entity.record_type(), E::KIND),
            }
            .into());
        }
        Ok(())
    }
}

/// Copy with the cell list in persisted form only.
fn detached<E: CellSetEntity>(entity: &E) -> E {
    let mut copy = entity.clone();
    let stored = copy.cell_set().stored().to_string();
    *copy.cell_set_mut() = CellSet::from_stored(stored);
    copy
}

fn read<T>(lock: &RwLock<T>) -> ColonnadeResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StorageError::LockPoisoned.into())
}

fn write<T>(lock: &RwLock<T>) -> ColonnadeResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StorageError::LockPoisoned.into())
}

impl<E: CellSetEntity> ViewStorage for MockViewStorage<E> {
    type Entity = E;

    fn insert(&self, entity: &mut E) -> ColonnadeResult<i64> {
        let mut entities = write(&self.entities)?;
        if entity.meta().state != EntityState::Draft {
            return Err(StorageError::InsertFailed {
                kind: E::KIND,
                reason: format!("entity is {:?}, not a draft", entity.meta().state),
            }
            .into());
        }
        if entities.contains_key(&entity.uuid()) {
            return Err(StorageError::Conflict {
                kind: E::KIND,
                reason: format!("portable key {} is already in use", entity.uuid()),
            }
            .into());
        }
        Self::check_single_default(&entities, entity)?;

        let id = {
            let mut next_id = write(&self.next_id)?;
            let id = *next_id;
            *next_id += 1;
            id
        };
        let meta = entity.meta_mut();
        meta.id = Some(id);
        meta.state = EntityState::Persisted;
        entities.insert(entity.uuid(), detached(entity));

        debug!(kind = E::KIND, id = id, uuid = %entity.uuid(), "entity inserted");
        Ok(id)
    }

    fn get(&self, id: i64) -> ColonnadeResult<Option<E>> {
        let entities = read(&self.entities)?;
        Ok(entities
            .values()
            .find(|e| e.meta().id == Some(id))
            .map(detached))
    }

    fn get_by_uuid(&self, uuid: Uuid) -> ColonnadeResult<Option<E>> {
        let entities = read(&self.entities)?;
        Ok(entities.get(&uuid).map(detached))
    }

    fn update(&self, entity: &E) -> ColonnadeResult<()> {
        let mut entities = write(&self.entities)?;
        let stored = entities.get(&entity.uuid()).ok_or(StorageError::NotFound {
            kind: E::KIND,
            key: entity.uuid(),
        })?;
        let id = stored.meta().id;
        Self::check_single_default(&entities, entity)?;

        let mut replacement = detached(entity);
        let meta = replacement.meta_mut();
        meta.id = id;
        meta.state = EntityState::Persisted;
        entities.insert(entity.uuid(), replacement);
        Ok(())
    }

    fn delete(&self, uuid: Uuid) -> ColonnadeResult<E> {
        let mut entities = write(&self.entities)?;
        let mut dependents = write(&self.dependents)?;
        let entity = entities.get(&uuid).ok_or(StorageError::NotFound {
            kind: E::KIND,
            key: uuid,
        })?;

        let blocking = dependents.get(&uuid).cloned().unwrap_or_default();
        entity.check_deletable(&blocking)?;

        let mut removed = entities.remove(&uuid).ok_or(StorageError::NotFound {
            kind: E::KIND,
            key: uuid,
        })?;
        dependents.remove(&uuid);
        removed.meta_mut().state = EntityState::Deleted;

        debug!(kind = E::KIND, uuid = %uuid, "entity deleted");
        Ok(removed)
    }

    fn list_for(&self, record_type: &RecordTypeId, viewer: &Viewer) -> ColonnadeResult<Vec<E>> {
        let entities = read(&self.entities)?;
        let mut listed: Vec<E> = entities
            .values()
            .filter(|e| e.record_type() == record_type && e.can_view(viewer))
            .map(detached)
            .collect();
        listed.sort_by_key(|e| e.meta().id);
        Ok(listed)
    }

    fn register_dependent(&self, uuid: Uuid, dependent: Dependent) -> ColonnadeResult<()> {
        if !read(&self.entities)?.contains_key(&uuid) {
            return Err(StorageError::NotFound {
                kind: E::KIND,
                key: uuid,
            }
            .into());
        }
        let mut dependents = write(&self.dependents)?;
        let list = dependents.entry(uuid).or_default();
        if !list.contains(&dependent) {
            list.push(dependent);
        }
        Ok(())
    }

    fn release_dependent(&self, uuid: Uuid, dependent: &Dependent) -> ColonnadeResult<bool> {
        let mut dependents = write(&self.dependents)?;
        let Some(list) = dependents.get_mut(&uuid) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|d| d != dependent);
        Ok(list.len() != before)
    }

    fn dependents_of(&self, uuid: Uuid) -> ColonnadeResult<Vec<Dependent>> {
        Ok(read(&self.dependents)?
            .get(&uuid)
            .cloned()
            .unwrap_or_default())
    }

    fn repair_stale(&self, registry: &CellRegistry, services: &Services) -> ColonnadeResult<usize> {
        let mut entities = write(&self.entities)?;
        let mut repaired = 0;
        for stored in entities.values_mut() {
            let mut entity = detached(stored);
            if entity.repair(registry, services)? {
                *stored = detached(&entity);
                repaired += 1;
            }
        }
        info!(kind = E::KIND, repaired = repaired, "stale cell lists rewritten");
        Ok(repaired)
    }
}

// ============================================================================
// TESTS
// ============================================================================
