use core::{any::Any, fmt};
use std::{
    cell::{Ref, RefCell},
    collections::HashMap,
    rc::Rc,
};

use crate::{
    component::{Component, ComponentKind},
    entity::Entity,
    World,
};

/// A component value taken out of its store, shared between the removal notification and the
/// world.
///
/// # Implementation
/// A slot behind an `Rc`. [World::mark_for_removal] queues its notifications with empty slots,
/// since the components stay attached until the flush, which moves each detached value into its
/// slot. [World::remove_component] fills the slot straight away. For a deactivated entity the
/// inactive record and the notification share the slot, so it empties again when the entity is
/// reactivated and the value goes back into its store.
#[derive(Clone, Default)]
pub struct DetachedComponent(Rc<RefCell<Option<Box<dyn Any>>>>);

impl DetachedComponent {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn holding(component: Box<dyn Any>) -> Self {
        Self(Rc::new(RefCell::new(Some(component))))
    }

    pub(crate) fn fill(&self, component: Box<dyn Any>) {
        *self.0.borrow_mut() = Some(component);
    }

    pub(crate) fn take(&self) -> Option<Box<dyn Any>> {
        self.0.borrow_mut().take()
    }

    pub(crate) fn with_mut(&self, f: impl FnOnce(&mut dyn Any)) {
        if let Some(component) = self.0.borrow_mut().as_deref_mut() {
            f(component);
        }
    }

    pub fn is_present(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Borrows the detached value as a `C`. Returns `None` while the value is still attached
    /// somewhere, or if it is not a `C`.
    ///
    /// # Panics
    /// - If the entity is reactivated while the returned guard is alive
    pub fn get<C: Component>(&self) -> Option<Ref<'_, C>> {
        Ref::filter_map(self.0.borrow(), |slot| slot.as_deref()?.downcast_ref::<C>()).ok()
    }
}

/// Two handles are equal when they share a slot.
impl PartialEq for DetachedComponent {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for DetachedComponent {}

impl fmt::Debug for DetachedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = self.0.try_borrow().map_or(true, |slot| slot.is_some());
        f.debug_struct("DetachedComponent")
            .field("present", &present)
            .finish()
    }
}

/// Lifecycle notifications raised by the [World]
///
/// An added component is still in its store when the event is dispatched, unless something
/// removed it in the meantime, so it is read back through the world. A removed component travels
/// with the event as a [DetachedComponent].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityEvent {
    EntityCreated(Entity),
    EntityInitialized(Entity),
    EntityRemoved(Entity),
    ComponentAdded(Entity, ComponentKind),
    ComponentRemoved(Entity, ComponentKind, DetachedComponent),
}

impl EntityEvent {
    pub fn kind(&self) -> EntityEventKind {
        match self {
            Self::EntityCreated(_) => EntityEventKind::EntityCreated,
            Self::EntityInitialized(_) => EntityEventKind::EntityInitialized,
            Self::EntityRemoved(_) => EntityEventKind::EntityRemoved,
            Self::ComponentAdded(..) => EntityEventKind::ComponentAdded,
            Self::ComponentRemoved(..) => EntityEventKind::ComponentRemoved,
        }
    }

    pub fn entity(&self) -> Entity {
        match *self {
            Self::EntityCreated(entity)
            | Self::EntityInitialized(entity)
            | Self::EntityRemoved(entity)
            | Self::ComponentAdded(entity, _)
            | Self::ComponentRemoved(entity, ..) => entity,
        }
    }

    pub fn component_kind(&self) -> Option<ComponentKind> {
        match *self {
            Self::ComponentAdded(_, kind) | Self::ComponentRemoved(_, kind, _) => Some(kind),
            _ => None,
        }
    }

    /// The removed component, for [EntityEvent::ComponentRemoved]
    pub fn detached(&self) -> Option<&DetachedComponent> {
        match self {
            Self::ComponentRemoved(_, _, component) => Some(component),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEventKind {
    EntityCreated,
    EntityInitialized,
    EntityRemoved,
    ComponentAdded,
    ComponentRemoved,
}

/// FIFO queue of events. Pushing never fails and never drops or merges events.
///
/// Events are written into one buffer; [Events::take] swaps it out, so anything pushed while the
/// taken batch is being dispatched lands in the next batch.
pub struct Events<T> {
    write: Vec<T>,
}

impl<T> Events<T> {
    pub fn new() -> Self {
        Self { write: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            write: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, event: T) {
        self.write.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.write.iter()
    }

    pub fn len(&self) -> usize {
        self.write.len()
    }

    pub fn is_empty(&self) -> bool {
        self.write.is_empty()
    }

    /// Takes every queued event, in the order they were pushed.
    pub fn take(&mut self) -> Vec<T> {
        let capacity = self.write.capacity();
        core::mem::replace(&mut self.write, Vec::with_capacity(capacity))
    }

    pub fn clear(&mut self) {
        self.write.clear();
    }
}

impl<T> Default for Events<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub type Listener = Box<dyn FnMut(&mut World, &EntityEvent)>;

/// Listeners keyed by event kind, run by [World::update] once per tick
pub struct EventDispatcher {
    listeners: HashMap<EntityEventKind, Vec<Listener>, ahash::RandomState>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::with_hasher(ahash::RandomState::default()),
        }
    }

    pub fn add_listener(&mut self, kind: EntityEventKind, listener: Listener) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    /// Runs the listeners for each event in order. Within an event, listeners run in
    /// registration order.
    pub fn dispatch(&mut self, world: &mut World, events: &[EntityEvent]) {
        for event in events {
            let Some(listeners) = self.listeners.get_mut(&event.kind()) else {
                continue;
            };

            for listener in listeners.iter_mut() {
                listener(world, event);
            }
        }
    }

    /// Appends the listeners of `other` after this dispatcher's own.
    pub fn merge(&mut self, other: EventDispatcher) {
        for (kind, listeners) in other.listeners {
            self.listeners.entry(kind).or_default().extend(listeners);
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
