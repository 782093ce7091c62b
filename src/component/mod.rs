pub mod hooks;
pub mod storage;

use core::any::{Any, TypeId};
use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;

use crate::entity::Entity;

use self::storage::{AnyStorage, ComponentStorage};

/// Unique sequential integer
pub type ComponentID = usize;

pub trait Component: 'static {
    /// Returns the type id of the component type
    fn type_id() -> TypeId {
        TypeId::of::<Self>()
    }
}
impl<T: Any> Component for T {}

/// Identifies a component kind in notifications and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentKind {
    pub id: ComponentID,
    pub name: &'static str,
}

impl ComponentKind {
    pub fn of<C: Component>(id: ComponentID) -> Self {
        Self {
            id,
            name: std::any::type_name::<C>(),
        }
    }
}

/// A registered "kind `A` satisfies lookups of `B`" relation, along with the projection from
/// the source component to `B`.
struct Upcast<A, B: ?Sized> {
    source: ComponentID,
    cast: fn(&A) -> &B,
}

/// [Upcast] with the source kind erased, so that every upcast to `B` can share one list.
trait ErasedUpcast<B: ?Sized> {
    fn source(&self) -> ComponentID;

    fn cast<'a>(&self, component: &'a dyn Any) -> Option<&'a B>;
}

impl<A: Component, B: ?Sized + 'static> ErasedUpcast<B> for Upcast<A, B> {
    fn source(&self) -> ComponentID {
        self.source
    }

    fn cast<'a>(&self, component: &'a dyn Any) -> Option<&'a B> {
        component.downcast_ref::<A>().map(self.cast)
    }
}

/// Owns one store per component kind, and the compatibility relation between kinds
///
/// # Implementation
/// Stores are heap allocated trait objects indexed by [ComponentID], which is assigned in
/// registration order. Typed access downcasts the trait object back to its concrete
/// [ComponentStorage]; the id map guarantees the downcast matches.
///
/// Compatible kinds are keyed by the [TypeId] of the looked-up type, which may be a trait object
/// type rather than a component. Each entry is a `Box<dyn ErasedUpcast<B>>`, boxed again as
/// [Any] so that lists for different `B` fit in one map.
pub struct ComponentManager {
    /// Used to translate component type ids to component ids
    ids: HashMap<TypeId, ComponentID, BuildNoHashHasher<u64>>,

    /// Stores for each component type, accessible using the component id as the index
    storages: Vec<Box<dyn AnyStorage>>,

    compatible: HashMap<TypeId, Vec<Box<dyn Any>>, BuildNoHashHasher<u64>>,
}

impl ComponentManager {
    pub fn new() -> Self {
        Self {
            ids: HashMap::with_capacity_and_hasher(8, BuildNoHashHasher::default()),
            storages: Vec::with_capacity(8),
            compatible: HashMap::with_capacity_and_hasher(4, BuildNoHashHasher::default()),
        }
    }

    /// Registers a component type, creating its store. Registering twice is a no-op.
    pub fn register<C: Component>(&mut self) -> ComponentID {
        let type_id = C::type_id();
        if let Some(&id) = self.ids.get(&type_id) {
            return id;
        }

        let comp_id = self.storages.len();
        self.ids.insert(type_id, comp_id);
        self.storages
            .push(Box::new(ComponentStorage::<C>::new(ComponentKind::of::<C>(comp_id))));

        log::trace!(
            "registered component kind {} as {}",
            std::any::type_name::<C>(),
            comp_id
        );
        comp_id
    }

    /// Returns the component id for the given component type, if a store exists for it
    pub fn get_id<C: Component>(&self) -> Option<ComponentID> {
        self.ids.get(&C::type_id()).copied()
    }

    pub fn len(&self) -> usize {
        self.storages.len()
    }

    pub fn storage<C: Component>(&self) -> Option<&ComponentStorage<C>> {
        let id = self.get_id::<C>()?;
        self.storages[id].as_any().downcast_ref()
    }

    pub fn storage_mut<C: Component>(&mut self) -> Option<&mut ComponentStorage<C>> {
        let id = self.get_id::<C>()?;
        self.storages[id].as_any_mut().downcast_mut()
    }

    /// Returns the store for the given component type, registering it first if needed
    pub fn storage_or_register<C: Component>(&mut self) -> &mut ComponentStorage<C> {
        let id = self.register::<C>();

        #[cold]
        #[inline(never)]
        #[track_caller]
        fn assert_failed<C>() -> ! {
            panic!(
                "Store for component type {:?} has a mismatched type",
                std::any::type_name::<C>()
            );
        }

        match self.storages[id].as_any_mut().downcast_mut() {
            Some(storage) => storage,
            None => assert_failed::<C>(),
        }
    }

    pub fn storage_by_id(&self, id: ComponentID) -> &dyn AnyStorage {
        &*self.storages[id]
    }

    pub fn storage_by_id_mut(&mut self, id: ComponentID) -> &mut dyn AnyStorage {
        &mut *self.storages[id]
    }

    /// Kinds of every store holding a component for the entity, in registration order
    pub fn kinds_of(&self, entity: Entity) -> Vec<ComponentKind> {
        self.storages
            .iter()
            .filter(|storage| storage.contains(entity))
            .map(|storage| storage.kind())
            .collect()
    }

    /// Records that components of kind `A` also satisfy lookups of `B`, projected through `cast`.
    ///
    /// When several kinds satisfy the same lookup, the most recently declared one wins.
    pub fn declare_compatible<A: Component, B: ?Sized + 'static>(&mut self, cast: fn(&A) -> &B) {
        let source = self.register::<A>();
        let upcast: Box<dyn ErasedUpcast<B>> = Box::new(Upcast { source, cast });

        self.compatible
            .entry(TypeId::of::<B>())
            .or_default()
            .push(Box::new(upcast));
    }

    /// Looks up the entity's component through the compatibility relation only.
    pub fn find_compatible<B: ?Sized + 'static>(&self, entity: Entity) -> Option<&B> {
        let upcasts = self.compatible.get(&TypeId::of::<B>())?;

        upcasts
            .iter()
            .rev()
            .filter_map(|upcast| upcast.downcast_ref::<Box<dyn ErasedUpcast<B>>>())
            .find_map(|upcast| {
                let component = self.storages[upcast.source()].get_any(entity)?;
                upcast.cast(component)
            })
    }
}

impl Default for ComponentManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type CompA = u32;
    type CompB = u64;

    trait Named {
        fn name(&self) -> &str;
    }

    struct Player {
        name: String,
    }

    struct Monster {
        name: String,
    }

    impl Named for Player {
        fn name(&self) -> &str {
            &self.name
        }
    }

    impl Named for Monster {
        fn name(&self) -> &str {
            &self.name
        }
    }

    #[test]
    fn component_registration() {
        let mut manager = ComponentManager::new();
        manager.register::<CompA>();
        manager.register::<CompB>();
        manager.register::<CompA>();

        assert_eq!(manager.get_id::<CompA>(), Some(0));
        assert_eq!(manager.get_id::<CompB>(), Some(1));
        assert_eq!(manager.get_id::<i8>(), None);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn typed_storage_access() {
        let mut manager = ComponentManager::new();
        manager.storage_or_register::<CompA>().add(1, 42).unwrap();

        assert_eq!(manager.storage::<CompA>().unwrap().get(1), Some(&42));
        assert!(manager.storage::<CompB>().is_none());
        assert_eq!(manager.kinds_of(1), vec![ComponentKind::of::<CompA>(0)]);
    }

    #[test]
    fn compatible_lookup_through_trait_object() {
        let mut manager = ComponentManager::new();
        manager.declare_compatible::<Player, dyn Named>(|p| p as &dyn Named);
        manager.declare_compatible::<Monster, dyn Named>(|m| m as &dyn Named);

        manager
            .storage_or_register::<Player>()
            .add(1, Player { name: "ada".into() })
            .unwrap();
        manager
            .storage_or_register::<Monster>()
            .add(2, Monster { name: "grue".into() })
            .unwrap();

        assert_eq!(manager.find_compatible::<dyn Named>(1).map(|n| n.name()), Some("ada"));
        assert_eq!(manager.find_compatible::<dyn Named>(2).map(|n| n.name()), Some("grue"));
        assert!(manager.find_compatible::<dyn Named>(3).is_none());
        assert!(manager.find_compatible::<CompA>(1).is_none());
    }

    #[test]
    fn most_recent_declaration_wins() {
        let mut manager = ComponentManager::new();
        manager.declare_compatible::<Player, dyn Named>(|p| p as &dyn Named);
        manager.declare_compatible::<Monster, dyn Named>(|m| m as &dyn Named);

        manager
            .storage_or_register::<Player>()
            .add(1, Player { name: "player".into() })
            .unwrap();
        manager
            .storage_or_register::<Monster>()
            .add(1, Monster { name: "monster".into() })
            .unwrap();

        assert_eq!(
            manager.find_compatible::<dyn Named>(1).map(|n| n.name()),
            Some("monster")
        );
    }
}
