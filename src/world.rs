use core::any::Any;
use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;

use crate::{
    component::{storage::ComponentStorage, Component, ComponentID, ComponentKind, ComponentManager},
    config::WorldConfig,
    entity::{Entity, EntityManager},
    error::{EcsError, Result},
    event::{DetachedComponent, EntityEvent, EntityEventKind, EventDispatcher, Events},
    inspector::{self, AttributeBag, Blueprint, Inspect, InspectorRegistry},
};

/// Detached components of one entity, in store registration order
type DetachedRecord = Vec<(ComponentID, DetachedComponent)>;

/// Owns every entity, component store and queued notification
///
/// # Implementation
/// Entity states live in the [EntityManager] and components in one store per kind inside the
/// [ComponentManager]. An entity is nothing more than an id that these agree on. Mutations apply
/// immediately and queue their notifications in `events`; [World::update] hands them to the
/// listeners once per tick.
///
/// Components of an inactive entity are held in `inactive`, outside every store. The slots
/// queued with the removal notifications of marked entities are held in `removing` until the
/// flush fills them.
pub struct World {
    pub(crate) entity_manager: EntityManager,
    pub(crate) component_manager: ComponentManager,
    pub(crate) inspector_registry: InspectorRegistry,
    pub(crate) events: Events<EntityEvent>,
    pub(crate) dispatcher: EventDispatcher,
    inactive: HashMap<Entity, DetachedRecord, BuildNoHashHasher<u32>>,
    removing: HashMap<Entity, DetachedRecord, BuildNoHashHasher<u32>>,
    pub(crate) tick: u32,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(&WorldConfig::default())
    }

    pub fn with_config(config: &WorldConfig) -> Self {
        Self {
            entity_manager: EntityManager::new(config.first_entity_id, config.entity_capacity),
            component_manager: ComponentManager::new(),
            inspector_registry: InspectorRegistry::new(),
            events: Events::with_capacity(config.event_capacity),
            dispatcher: EventDispatcher::new(),
            inactive: HashMap::with_hasher(BuildNoHashHasher::default()),
            removing: HashMap::with_hasher(BuildNoHashHasher::default()),
            tick: 0,
        }
    }

    // Entities

    /// Creates an entity with the next unused id. Fails once every id has been handed out.
    #[inline]
    pub fn create_entity(&mut self) -> Result<Entity> {
        let entity = self.entity_manager.create()?;
        self.events.push(EntityEvent::EntityCreated(entity));

        log::debug!("created entity {entity}");
        Ok(entity)
    }

    /// Creates an entity with a caller-chosen id. Later automatic ids continue past it.
    pub fn create_entity_with_id(&mut self, entity: Entity) -> Result<Entity> {
        let entity = self.entity_manager.create_with_id(entity)?;
        self.events.push(EntityEvent::EntityCreated(entity));

        log::debug!("created entity {entity} with explicit id");
        Ok(entity)
    }

    /// Creates an entity and attaches every component kind the blueprint names, each built from
    /// the blueprint's attributes.
    ///
    /// Names without a registered inspector are skipped with a warning, as are repeated names.
    /// All components are built before the entity is created, so an initialisation or
    /// validation failure leaves the world untouched.
    pub fn create_entity_from_blueprint(&mut self, blueprint: &Blueprint) -> Result<Entity> {
        let mut built = Vec::with_capacity(blueprint.components.len());

        for name in &blueprint.components {
            let Some(component) = self
                .inspector_registry
                .build_named(name, &blueprint.attributes)
            else {
                log::warn!("no inspector metadata registered for component `{name}`, skipping");
                continue;
            };

            let component = component?;
            let type_id = (*component.component).type_id();
            if built
                .iter()
                .any(|other: &inspector::BuiltComponent| (*other.component).type_id() == type_id)
            {
                log::warn!("blueprint names component `{name}` more than once, skipping");
                continue;
            }

            built.push(component);
        }

        let entity = self.create_entity()?;
        for component in built {
            let comp_id = (component.register)(&mut self.component_manager);
            self.attach(entity, comp_id, component.component)?;
        }

        Ok(entity)
    }

    /// Returns true for alive entities, including those pending removal.
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entity_manager.alive(entity)
    }

    #[inline]
    pub fn is_pending_removal(&self, entity: Entity) -> bool {
        self.entity_manager.pending_removal(entity)
    }

    #[inline]
    pub fn is_inactive(&self, entity: Entity) -> bool {
        self.entity_manager.inactive(entity)
    }

    /// Alive entities, including those pending removal, in ascending id order
    pub fn all_entities(&self) -> Vec<Entity> {
        self.entity_manager.alive_entities()
    }

    /// Number of alive entities, including those pending removal
    pub fn count(&self) -> usize {
        self.entity_manager.alive_count()
    }

    /// Marks the entity for removal at the next [World::flush_removals].
    ///
    /// Removal notifications for the entity and each of its components are queued now, although
    /// the components stay attached until the flush. Their [DetachedComponent] slots are filled
    /// by the flush. Marking twice is a no-op. An inactive entity is instead destroyed
    /// immediately, without notifications.
    pub fn mark_for_removal(&mut self, entity: Entity) -> Result<()> {
        if let Some(record) = self.inactive.remove(&entity) {
            for (_, component) in record {
                component.with_mut(|component| self.teardown(component));
            }
            self.entity_manager.set_removed(entity);

            log::debug!("discarded inactive entity {entity}");
            return Ok(());
        }

        self.ensure_alive(entity)?;
        if self.entity_manager.pending_removal(entity) {
            return Ok(());
        }

        let mut slots = DetachedRecord::new();
        for kind in self.component_manager.kinds_of(entity) {
            let slot = DetachedComponent::empty();
            self.events
                .push(EntityEvent::ComponentRemoved(entity, kind, slot.clone()));
            slots.push((kind.id, slot));
        }
        self.events.push(EntityEvent::EntityRemoved(entity));
        self.entity_manager.mark_pending(entity);
        self.removing.insert(entity, slots);

        log::debug!("marked entity {entity} for removal");
        Ok(())
    }

    /// Destroys every entity marked since the previous flush, returning how many were destroyed.
    ///
    /// The pending set is taken up front, so entities marked while this runs wait for the next
    /// flush. No notifications are queued; they were queued when the entities were marked.
    pub fn flush_removals(&mut self) -> usize {
        let pending = self.entity_manager.take_pending();

        for &entity in &pending {
            let slots = self.removing.remove(&entity).unwrap_or_default();

            for comp_id in 0..self.component_manager.len() {
                let storage = self.component_manager.storage_by_id_mut(comp_id);
                let Some(mut component) = storage.remove_any(entity) else {
                    continue;
                };

                self.teardown(&mut *component);
                // Components attached after marking were never announced, so they have no slot
                if let Some((_, slot)) = slots.iter().find(|(id, _)| *id == comp_id) {
                    slot.fill(component);
                }
            }
            self.entity_manager.set_removed(entity);
        }

        if !pending.is_empty() {
            log::debug!("flushed {} removed entities", pending.len());
        }
        pending.len()
    }

    /// Suspends the entity: its components are detached and held aside, and it stops being
    /// alive. A removal notification carrying the detached value is queued for each component,
    /// but none for the entity.
    ///
    /// Deactivating an inactive entity, or one already pending removal, does nothing.
    pub fn deactivate(&mut self, entity: Entity) -> Result<()> {
        if self.entity_manager.inactive(entity) {
            return Ok(());
        }
        self.ensure_alive(entity)?;
        if self.entity_manager.pending_removal(entity) {
            log::debug!("entity {entity} is pending removal, not deactivating");
            return Ok(());
        }

        let mut record = DetachedRecord::new();
        for comp_id in 0..self.component_manager.len() {
            let storage = self.component_manager.storage_by_id_mut(comp_id);
            let kind = storage.kind();
            if let Some(component) = storage.remove_any(entity) {
                let slot = DetachedComponent::holding(component);
                self.events
                    .push(EntityEvent::ComponentRemoved(entity, kind, slot.clone()));
                record.push((comp_id, slot));
            }
        }

        self.entity_manager.set_inactive(entity);
        self.inactive.insert(entity, record);

        log::debug!("deactivated entity {entity}");
        Ok(())
    }

    /// Restores an inactive entity and the components it held. Does nothing for any entity that
    /// is not inactive.
    ///
    /// # Panics
    /// - If a listener still borrows one of the entity's [DetachedComponent]s
    pub fn activate(&mut self, entity: Entity) -> Result<()> {
        let Some(record) = self.inactive.remove(&entity) else {
            return Ok(());
        };

        self.entity_manager.set_active(entity);
        for (comp_id, slot) in record {
            if let Some(component) = slot.take() {
                self.attach(entity, comp_id, component)?;
            }
        }
        self.events.push(EntityEvent::EntityInitialized(entity));

        log::debug!("activated entity {entity}");
        Ok(())
    }

    // Components

    /// Creates the store for the component type, if it does not exist yet
    pub fn register_component<C: Component>(&mut self) -> ComponentID {
        self.component_manager.register::<C>()
    }

    /// Registers the component type's [Inspect] capabilities under its short type name
    pub fn register_inspector<C: Inspect>(&mut self) {
        self.component_manager.register::<C>();
        self.inspector_registry.register::<C>();
    }

    pub fn register_inspector_named<C: Inspect>(&mut self, name: impl Into<String>) {
        self.component_manager.register::<C>();
        self.inspector_registry.register_named::<C>(name);
    }

    /// Records that components of kind `A` can also be looked up as `B`. `B` may be a trait
    /// object type.
    ///
    /// If more than one kind attached to an entity satisfies a lookup, the most recently
    /// declared one wins.
    pub fn declare_compatible<A: Component, B: ?Sized + 'static>(&mut self, cast: fn(&A) -> &B) {
        self.component_manager.declare_compatible(cast);
    }

    pub fn on_component_added<C: Component>(&mut self, hook: impl FnMut(Entity, &C) + 'static) {
        self.component_manager
            .storage_or_register::<C>()
            .on_added(Box::new(hook));
    }

    pub fn on_component_removed<C: Component>(&mut self, hook: impl FnMut(Entity, &C) + 'static) {
        self.component_manager
            .storage_or_register::<C>()
            .on_removed(Box::new(hook));
    }

    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> Result<()> {
        self.ensure_alive(entity)?;

        let storage = self.component_manager.storage_or_register::<C>();
        storage.add(entity, component)?;

        let kind = storage.kind();
        self.events.push(EntityEvent::ComponentAdded(entity, kind));

        log::trace!("attached {} to entity {entity}", kind.name);
        Ok(())
    }

    /// Builds the component from the attributes through its [Inspect] capabilities, then
    /// attaches it.
    pub fn add_component_from_attributes<C: Inspect>(
        &mut self,
        entity: Entity,
        attributes: &AttributeBag,
    ) -> Result<()> {
        self.ensure_alive(entity)?;
        if self.has_component::<C>(entity) {
            return Err(EcsError::DuplicateComponent {
                entity,
                kind: std::any::type_name::<C>(),
            });
        }

        let component = inspector::build::<C>(attributes)?;
        if !self.inspector_registry.contains::<C>() {
            self.inspector_registry.register::<C>();
        }
        self.add_component(entity, component)
    }

    /// Detaches and tears down the entity's component of type `C`. Returns whether one was
    /// attached.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> Result<bool> {
        self.ensure_alive(entity)?;

        let Some(storage) = self.component_manager.storage_mut::<C>() else {
            return Err(EcsError::UnknownComponentKind(std::any::type_name::<C>()));
        };
        let kind = storage.kind();
        let Some(mut component) = storage.remove(entity) else {
            return Ok(false);
        };

        self.teardown(&mut component);
        self.events.push(EntityEvent::ComponentRemoved(
            entity,
            kind,
            DetachedComponent::holding(Box::new(component)),
        ));

        log::trace!("detached {} from entity {entity}", kind.name);
        Ok(true)
    }

    pub fn get_component<C: Component>(&self, entity: Entity) -> Result<Option<&C>> {
        self.ensure_alive(entity)?;

        Ok(self
            .component_manager
            .storage::<C>()
            .and_then(|storage| storage.get(entity)))
    }

    /// Like [World::get_component], but falls back to kinds declared compatible with `C` when
    /// the entity has no `C` of its own.
    pub fn get_component_inherited<C: Component>(&self, entity: Entity) -> Result<Option<&C>> {
        match self.get_component::<C>(entity)? {
            Some(component) => Ok(Some(component)),
            None => Ok(self.component_manager.find_compatible::<C>(entity)),
        }
    }

    /// Looks the entity's component up through the declared compatibility relation only.
    pub fn find_component<B: ?Sized + 'static>(&self, entity: Entity) -> Result<Option<&B>> {
        self.ensure_alive(entity)?;
        Ok(self.component_manager.find_compatible::<B>(entity))
    }

    pub fn get_component_mut<C: Component>(&mut self, entity: Entity) -> Result<Option<&mut C>> {
        self.ensure_alive(entity)?;

        Ok(self
            .component_manager
            .storage_mut::<C>()
            .and_then(|storage| storage.get_mut(entity)))
    }

    /// Returns true if the specified entity has the specified component. Also will return false if
    /// the entity is not alive.
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self
                .component_manager
                .storage::<C>()
                .is_some_and(|storage| storage.contains(entity))
    }

    /// Kinds of the components attached to the entity, in store registration order
    pub fn component_kinds(&self, entity: Entity) -> Result<Vec<ComponentKind>> {
        self.ensure_alive(entity)?;
        Ok(self.component_manager.kinds_of(entity))
    }

    pub fn entities_with_component<C: Component>(&self) -> Vec<Entity> {
        self.component_manager
            .storage::<C>()
            .map(|storage| storage.entities().to_vec())
            .unwrap_or_default()
    }

    pub fn iter_components<C: Component>(&self) -> impl Iterator<Item = (Entity, &C)> + '_ {
        self.component_manager
            .storage::<C>()
            .into_iter()
            .flat_map(|storage| storage.iter())
    }

    pub fn storage<C: Component>(&self) -> Option<&ComponentStorage<C>> {
        self.component_manager.storage::<C>()
    }

    // Events

    pub fn events(&self) -> &Events<EntityEvent> {
        &self.events
    }

    /// Takes every queued event, for schedulers that dispatch outside [World::update].
    pub fn drain_events(&mut self) -> Vec<EntityEvent> {
        self.events.take()
    }

    pub fn add_listener(
        &mut self,
        kind: EntityEventKind,
        listener: impl FnMut(&mut World, &EntityEvent) + 'static,
    ) {
        self.dispatcher.add_listener(kind, Box::new(listener));
    }

    /// Ends the current tick: flushes pending removals, then dispatches the queued events to the
    /// listeners. Events raised by listeners are dispatched on the next tick.
    pub fn update(&mut self) {
        self.flush_removals();

        let events = self.events.take();

        // Listeners need the world mutably, so the dispatcher is moved out while they run.
        let mut dispatcher = core::mem::take(&mut self.dispatcher);
        dispatcher.dispatch(self, &events);
        let added_meanwhile = core::mem::replace(&mut self.dispatcher, dispatcher);
        self.dispatcher.merge(added_meanwhile);

        self.tick += 1;
        log::debug!("tick {} dispatched {} events", self.tick, events.len());
    }

    /// Number of completed [World::update] calls
    pub fn tick(&self) -> u32 {
        self.tick
    }

    // Internals

    fn ensure_alive(&self, entity: Entity) -> Result<()> {
        if self.entity_manager.alive(entity) {
            Ok(())
        } else {
            Err(EcsError::UnknownEntity(entity))
        }
    }

    /// Attaches a type-erased component to an alive entity and queues the notification.
    fn attach(&mut self, entity: Entity, comp_id: ComponentID, component: Box<dyn Any>) -> Result<()> {
        let storage = self.component_manager.storage_by_id_mut(comp_id);
        storage.add_any(entity, component)?;

        let kind = storage.kind();
        self.events.push(EntityEvent::ComponentAdded(entity, kind));

        log::trace!("attached {} to entity {entity}", kind.name);
        Ok(())
    }

    fn teardown(&self, component: &mut dyn Any) {
        if !self.inspector_registry.teardown(component) {
            log::trace!("no teardown registered for destroyed component");
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
