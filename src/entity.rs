use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;

use crate::error::{EcsError, Result};

pub type Entity = u32;

/// Lifecycle state of an allocated entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Alive,
    /// Still alive, but will be destroyed by the next removal flush.
    PendingRemoval,
    /// Suspended; its components are held aside by the world until reactivation.
    Inactive,
    /// Destroyed. The id stays allocated forever and is never handed out again.
    Removed,
}

/// Allocates entity ids and tracks the state of every id ever issued.
///
/// # Implementation
/// Ids come from a monotonically increasing high-water mark, so there is no free list. Every
/// issued id keeps an entry in `states`, including removed ones, which is what allows an explicit
/// id to be rejected if it was handed out at any point in the past.
///
/// The mark is `None` once `Entity::MAX` has been issued. Automatic allocation then fails rather
/// than wrapping around, though unissued explicit ids below the mark are still accepted.
pub struct EntityManager {
    next_id: Option<Entity>,
    states: HashMap<Entity, EntityState, BuildNoHashHasher<u32>>,

    /// Entities marked since the last flush, in marking order
    pending: Vec<Entity>,

    /// Number of entities in the `Alive` or `PendingRemoval` state
    alive_count: usize,
}

impl EntityManager {
    pub fn new(first_id: Entity, capacity: usize) -> Self {
        Self {
            next_id: Some(first_id),
            states: HashMap::with_capacity_and_hasher(capacity, BuildNoHashHasher::default()),
            pending: Vec::with_capacity(capacity),
            alive_count: 0,
        }
    }

    pub fn create(&mut self) -> Result<Entity> {
        let entity = self.next_id.ok_or(EcsError::EntityIdsExhausted)?;
        self.next_id = entity.checked_add(1);
        self.states.insert(entity, EntityState::Alive);
        self.alive_count += 1;
        Ok(entity)
    }

    /// Allocates the given id and advances the high-water mark past it.
    pub fn create_with_id(&mut self, entity: Entity) -> Result<Entity> {
        if self.states.contains_key(&entity) {
            return Err(EcsError::DuplicateEntity(entity));
        }

        self.states.insert(entity, EntityState::Alive);
        self.alive_count += 1;
        if self.next_id.is_some_and(|next_id| entity >= next_id) {
            self.next_id = entity.checked_add(1);
        }
        Ok(entity)
    }

    pub fn state(&self, entity: Entity) -> Option<EntityState> {
        self.states.get(&entity).copied()
    }

    /// Returns true for entities that are alive, including those pending removal.
    pub fn alive(&self, entity: Entity) -> bool {
        matches!(
            self.state(entity),
            Some(EntityState::Alive | EntityState::PendingRemoval)
        )
    }

    pub fn pending_removal(&self, entity: Entity) -> bool {
        self.state(entity) == Some(EntityState::PendingRemoval)
    }

    pub fn inactive(&self, entity: Entity) -> bool {
        self.state(entity) == Some(EntityState::Inactive)
    }

    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Returns all alive entities (including those pending removal) in ascending id order.
    pub fn alive_entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self
            .states
            .iter()
            .filter(|(_, state)| matches!(state, EntityState::Alive | EntityState::PendingRemoval))
            .map(|(&entity, _)| entity)
            .collect();
        entities.sort_unstable();
        entities
    }

    /// Moves an alive entity into the pending set. Returns false if it was already pending.
    ///
    /// The caller must have checked that the entity is alive.
    pub fn mark_pending(&mut self, entity: Entity) -> bool {
        debug_assert!(self.alive(entity));
        if self.pending_removal(entity) {
            return false;
        }

        self.states.insert(entity, EntityState::PendingRemoval);
        self.pending.push(entity);
        true
    }

    /// Takes the current pending set, leaving an empty one for anything marked afterwards.
    pub fn take_pending(&mut self) -> Vec<Entity> {
        core::mem::take(&mut self.pending)
    }

    pub fn set_removed(&mut self, entity: Entity) {
        if let Some(state) = self.states.get_mut(&entity) {
            if matches!(state, EntityState::Alive | EntityState::PendingRemoval) {
                self.alive_count -= 1;
            }
            *state = EntityState::Removed;
        }
    }

    /// The caller must have checked that the entity is alive and not pending removal.
    pub fn set_inactive(&mut self, entity: Entity) {
        debug_assert_eq!(self.state(entity), Some(EntityState::Alive));
        self.states.insert(entity, EntityState::Inactive);
        self.alive_count -= 1;
    }

    /// The caller must have checked that the entity is inactive.
    pub fn set_active(&mut self, entity: Entity) {
        debug_assert!(self.inactive(entity));
        self.states.insert(entity, EntityState::Alive);
        self.alive_count += 1;
    }
}
