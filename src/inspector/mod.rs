//! Builds components from attribute bags and releases them on teardown.
//!
//! Component kinds opt in by implementing [Inspect] and registering with an
//! [InspectorRegistry]. The registry is a table of monomorphised function pointers keyed by
//! [TypeId] and by short type name, so the world can initialise and tear down components whose
//! concrete type it does not know at the call site.

mod attribute;

pub use attribute::{AttributeBag, AttributeError};

use core::any::{Any, TypeId};
use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;
use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentID, ComponentManager};

/// Capabilities of a component kind that can be built from an [AttributeBag]
pub trait Inspect: Component + Default {
    /// Populates a default-constructed component from the bag. Missing keys keep their defaults.
    fn initialize(&mut self, attributes: &AttributeBag) -> Result<(), AttributeError>;

    fn validate(&self) -> Result<(), AttributeError> {
        Ok(())
    }

    /// Releases anything the component owns. Called when the component is destroyed, but not
    /// when its entity is merely deactivated.
    fn teardown(&mut self) {}
}

type BuildFn = fn(&AttributeBag) -> Result<Box<dyn Any>, AttributeError>;
type TeardownFn = fn(&mut dyn Any);
type RegisterFn = fn(&mut ComponentManager) -> ComponentID;

struct InspectorEntry {
    name: String,
    build: BuildFn,
    teardown: TeardownFn,
    register: RegisterFn,
}

/// A component built from a bag, along with what is needed to attach it to an entity
pub struct BuiltComponent {
    pub component: Box<dyn Any>,
    pub register: RegisterFn,
}

/// Maps component kinds to their [Inspect] capabilities
pub struct InspectorRegistry {
    by_type_id: HashMap<TypeId, InspectorEntry, BuildNoHashHasher<u64>>,
    by_name: HashMap<String, TypeId, ahash::RandomState>,
}

impl InspectorRegistry {
    pub fn new() -> Self {
        Self {
            by_type_id: HashMap::with_hasher(BuildNoHashHasher::default()),
            by_name: HashMap::with_hasher(ahash::RandomState::default()),
        }
    }

    /// Registers the component under its short type name, e.g. `Health` for `game::Health`.
    pub fn register<C: Inspect>(&mut self) {
        self.register_named::<C>(short_type_name(std::any::type_name::<C>()));
    }

    pub fn register_named<C: Inspect>(&mut self, name: impl Into<String>) {
        let name = name.into();
        let entry = InspectorEntry {
            name: name.clone(),
            build: |attributes| Ok(Box::new(build::<C>(attributes)?)),
            teardown: |component| {
                if let Some(component) = component.downcast_mut::<C>() {
                    component.teardown();
                }
            },
            register: |components| components.register::<C>(),
        };

        if let Some(previous) = self.by_type_id.insert(TypeId::of::<C>(), entry) {
            self.by_name.remove(&previous.name);
        }
        self.by_name.insert(name, TypeId::of::<C>());
    }

    pub fn contains<C: Component>(&self) -> bool {
        self.by_type_id.contains_key(&TypeId::of::<C>())
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_type_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type_id.is_empty()
    }

    /// Builds the named component kind. Returns `None` if no kind is registered under the name.
    pub fn build_named(
        &self,
        name: &str,
        attributes: &AttributeBag,
    ) -> Option<Result<BuiltComponent, AttributeError>> {
        let entry = self
            .by_name
            .get(name)
            .and_then(|type_id| self.by_type_id.get(type_id))?;

        Some((entry.build)(attributes).map(|component| BuiltComponent {
            component,
            register: entry.register,
        }))
    }

    /// Runs the teardown capability of a type-erased component. Returns false if the
    /// component's kind has no registered capabilities.
    pub fn teardown(&self, component: &mut dyn Any) -> bool {
        match self.by_type_id.get(&(*component).type_id()) {
            Some(entry) => {
                (entry.teardown)(component);
                true
            }
            None => false,
        }
    }
}

impl Default for InspectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Default-constructs, initialises and validates a component.
pub fn build<C: Inspect>(attributes: &AttributeBag) -> Result<C, AttributeError> {
    let mut component = C::default();
    component.initialize(attributes)?;
    component.validate()?;
    Ok(component)
}

/// An entity template: the component kinds to attach, and the attributes to build them from
///
/// Every kind is initialised from the same bag; each picks out the keys it knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blueprint {
    pub components: Vec<String>,
    pub attributes: AttributeBag,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, name: impl Into<String>) -> Self {
        self.components.push(name.into());
        self
    }

    pub fn with_attributes(mut self, attributes: AttributeBag) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, AttributeError> {
        serde_json::from_str(json).map_err(AttributeError::Malformed)
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Health {
        hp: i32,
    }

    impl Inspect for Health {
        fn initialize(&mut self, attributes: &AttributeBag) -> Result<(), AttributeError> {
            attributes.populate(self)
        }

        fn validate(&self) -> Result<(), AttributeError> {
            if self.hp < 0 {
                return Err(AttributeError::Validation {
                    component: "Health",
                    reason: format!("hp must not be negative, got {}", self.hp),
                });
            }
            Ok(())
        }
    }

    thread_local! {
        static RELEASED: Cell<u32> = const { Cell::new(0) };
    }

    #[derive(Default)]
    struct Sound;

    impl Inspect for Sound {
        fn initialize(&mut self, _: &AttributeBag) -> Result<(), AttributeError> {
            Ok(())
        }

        fn teardown(&mut self) {
            RELEASED.with(|released| released.set(released.get() + 1));
        }
    }

    #[test]
    fn short_names() {
        assert_eq!(short_type_name("game::stats::Health"), "Health");
        assert_eq!(short_type_name("Health"), "Health");
        assert_eq!(short_type_name("game::Wrapper<game::Inner>"), "Wrapper");
    }

    #[test]
    fn build_with_defaults_and_validation() {
        assert_eq!(build::<Health>(&AttributeBag::new()).unwrap(), Health { hp: 0 });
        assert_eq!(
            build::<Health>(&AttributeBag::new().with("hp", 12)).unwrap(),
            Health { hp: 12 }
        );
        assert!(matches!(
            build::<Health>(&AttributeBag::new().with("hp", -1)),
            Err(AttributeError::Validation { .. })
        ));
    }

    #[test]
    fn build_by_name() {
        let mut registry = InspectorRegistry::new();
        registry.register::<Health>();

        assert!(registry.contains::<Health>());
        assert!(registry.contains_name("Health"));
        assert!(registry.build_named("Mana", &AttributeBag::new()).is_none());

        let built = registry
            .build_named("Health", &AttributeBag::new().with("hp", 3))
            .unwrap()
            .unwrap();
        assert_eq!(built.component.downcast_ref::<Health>(), Some(&Health { hp: 3 }));

        let mut components = ComponentManager::new();
        assert_eq!((built.register)(&mut components), 0);
        assert_eq!(components.get_id::<Health>(), Some(0));
    }

    #[test]
    fn renaming_replaces_old_name() {
        let mut registry = InspectorRegistry::new();
        registry.register::<Health>();
        registry.register_named::<Health>("Vitality");

        assert_eq!(registry.len(), 1);
        assert!(!registry.contains_name("Health"));
        assert!(registry.contains_name("Vitality"));
    }

    #[test]
    fn teardown_dispatches_by_type() {
        let mut registry = InspectorRegistry::new();
        registry.register::<Sound>();

        let mut sound = Sound;
        assert!(registry.teardown(&mut sound));
        assert_eq!(RELEASED.with(|released| released.get()), 1);

        let mut health = Health { hp: 1 };
        assert!(!registry.teardown(&mut health));
    }

    #[test]
    fn blueprint_from_json() {
        let blueprint = Blueprint::from_json_str(
            r#"{"components": ["Health", "Sound"], "attributes": {"hp": 40}}"#,
        )
        .unwrap();

        assert_eq!(
            blueprint,
            Blueprint::new()
                .with_component("Health")
                .with_component("Sound")
                .with_attributes(AttributeBag::new().with("hp", 40))
        );
    }
}
