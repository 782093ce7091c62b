use core::any::Any;
use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;

use crate::{
    entity::Entity,
    error::{EcsError, Result},
};

use super::{
    hooks::{Hook, StorageHooks},
    Component, ComponentKind,
};

/// Stores every component of a single kind, keyed by entity
///
/// # Implementation
/// Components are packed into a dense vec, with a parallel vec of owning entities, so that
/// iteration is a plain slice walk. A sparse map translates an entity into its dense row.
/// Removal swap-removes, so iteration order is not stable across removals.
pub struct ComponentStorage<C: Component> {
    kind: ComponentKind,
    components: Vec<C>,
    entities: Vec<Entity>,
    rows: HashMap<Entity, usize, BuildNoHashHasher<u32>>,
    hooks: StorageHooks<C>,
}

impl<C: Component> ComponentStorage<C> {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            components: Vec::with_capacity(8),
            entities: Vec::with_capacity(8),
            rows: HashMap::with_capacity_and_hasher(8, BuildNoHashHasher::default()),
            hooks: StorageHooks::new(),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.rows.contains_key(&entity)
    }

    /// Attaches the component to the entity, then runs the `on_added` hooks.
    pub fn add(&mut self, entity: Entity, component: C) -> Result<()> {
        if self.contains(entity) {
            return Err(EcsError::DuplicateComponent {
                entity,
                kind: self.kind.name,
            });
        }

        let row = self.components.len();
        self.rows.insert(entity, row);
        self.entities.push(entity);
        self.components.push(component);

        self.hooks.added(entity, &self.components[row]);
        Ok(())
    }

    /// Detaches and returns the entity's component, running the `on_removed` hooks.
    pub fn remove(&mut self, entity: Entity) -> Option<C> {
        let row = self.rows.remove(&entity)?;

        let component = self.components.swap_remove(row);
        self.entities.swap_remove(row);

        // The previously last entity now lives at `row`
        if let Some(&moved) = self.entities.get(row) {
            self.rows.insert(moved, row);
        }

        self.hooks.removed(entity, &component);
        Some(component)
    }

    pub fn get(&self, entity: Entity) -> Option<&C> {
        let &row = self.rows.get(&entity)?;
        Some(&self.components[row])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut C> {
        let &row = self.rows.get(&entity)?;
        Some(&mut self.components[row])
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn components(&self) -> &[C] {
        &self.components
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.entities.iter().copied().zip(self.components.iter())
    }

    pub fn on_added(&mut self, hook: Hook<C>) {
        self.hooks.push_added(hook);
    }

    pub fn on_removed(&mut self, hook: Hook<C>) {
        self.hooks.push_removed(hook);
    }
}

/// Type-erased view of a [ComponentStorage], used where the world has to touch every store an
/// entity appears in without knowing their concrete types.
pub trait AnyStorage: 'static {
    fn kind(&self) -> ComponentKind;

    fn contains(&self, entity: Entity) -> bool;

    fn len(&self) -> usize;

    fn entities(&self) -> &[Entity];

    fn get_any(&self, entity: Entity) -> Option<&dyn Any>;

    fn remove_any(&mut self, entity: Entity) -> Option<Box<dyn Any>>;

    /// # Panics
    /// - If the boxed value is not of this storage's component type
    fn add_any(&mut self, entity: Entity, component: Box<dyn Any>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> AnyStorage for ComponentStorage<C> {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn contains(&self, entity: Entity) -> bool {
        ComponentStorage::contains(self, entity)
    }

    fn len(&self) -> usize {
        ComponentStorage::len(self)
    }

    fn entities(&self) -> &[Entity] {
        ComponentStorage::entities(self)
    }

    fn get_any(&self, entity: Entity) -> Option<&dyn Any> {
        self.get(entity).map(|component| component as &dyn Any)
    }

    fn remove_any(&mut self, entity: Entity) -> Option<Box<dyn Any>> {
        self.remove(entity)
            .map(|component| Box::new(component) as Box<dyn Any>)
    }

    fn add_any(&mut self, entity: Entity, component: Box<dyn Any>) -> Result<()> {
        #[cold]
        #[inline(never)]
        #[track_caller]
        fn assert_failed(kind: ComponentKind) -> ! {
            panic!("Boxed component does not match storage kind {:?}", kind.name);
        }

        let Ok(component) = component.downcast::<C>() else {
            assert_failed(self.kind);
        };

        self.add(entity, *component)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(i32);

    fn storage() -> ComponentStorage<Health> {
        ComponentStorage::new(ComponentKind::of::<Health>(0))
    }

    #[test]
    fn add_get_remove() {
        let mut storage = storage();
        storage.add(1, Health(10)).unwrap();
        storage.add(2, Health(20)).unwrap();

        assert_eq!(storage.get(1), Some(&Health(10)));
        assert_eq!(storage.len(), 2);

        assert_eq!(storage.remove(1), Some(Health(10)));
        assert_eq!(storage.remove(1), None);
        assert_eq!(storage.get(2), Some(&Health(20)));
        assert_eq!(storage.entities(), &[2]);
    }

    #[test]
    fn duplicate_add_keeps_first() {
        let mut storage = storage();
        storage.add(1, Health(10)).unwrap();

        let err = storage.add(1, Health(99)).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { entity: 1, .. }));
        assert_eq!(storage.get(1), Some(&Health(10)));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn swap_remove_keeps_rows_consistent() {
        let mut storage = storage();
        for entity in 0..5 {
            storage.add(entity, Health(entity as i32)).unwrap();
        }

        storage.remove(0);
        storage.remove(3);
        storage.get_mut(4).unwrap().0 = 40;

        let mut pairs: Vec<_> = storage.iter().map(|(e, h)| (e, h.0)).collect();
        pairs.sort();
        assert_eq!(pairs, vec![(1, 1), (2, 2), (4, 40)]);
    }

    #[test]
    fn hooks_fire_on_success_only() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut storage = storage();

        let added = seen.clone();
        storage.on_added(Box::new(move |e: Entity, h: &Health| added.borrow_mut().push(("added", e, h.0))));
        let removed = seen.clone();
        storage.on_removed(Box::new(move |e: Entity, h: &Health| removed.borrow_mut().push(("removed", e, h.0))));

        storage.add(1, Health(10)).unwrap();
        let _ = storage.add(1, Health(11));
        storage.remove(1);
        storage.remove(1);

        assert_eq!(*seen.borrow(), vec![("added", 1, 10), ("removed", 1, 10)]);
    }

    #[test]
    fn erased_round_trip() {
        let mut storage = storage();
        storage.add(3, Health(30)).unwrap();

        let erased: &mut dyn AnyStorage = &mut storage;
        let boxed = erased.remove_any(3).unwrap();
        assert!(!erased.contains(3));

        erased.add_any(3, boxed).unwrap();
        assert_eq!(
            erased.get_any(3).and_then(|c| c.downcast_ref::<Health>()),
            Some(&Health(30))
        );
    }
}
