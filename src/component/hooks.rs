use crate::entity::Entity;

pub type Hook<C> = Box<dyn FnMut(Entity, &C)>;

/// Ordered observer lists for a single component store.
///
/// Hooks run synchronously, in registration order, after the store has been mutated. They see
/// the component value but not the world, so they cannot re-enter it; reactions that need the
/// world go through the event queue instead.
pub struct StorageHooks<C> {
    on_added: Vec<Hook<C>>,
    on_removed: Vec<Hook<C>>,
}

impl<C> StorageHooks<C> {
    pub fn new() -> Self {
        Self {
            on_added: Vec::new(),
            on_removed: Vec::new(),
        }
    }

    pub fn push_added(&mut self, hook: Hook<C>) {
        self.on_added.push(hook);
    }

    pub fn push_removed(&mut self, hook: Hook<C>) {
        self.on_removed.push(hook);
    }

    pub fn added(&mut self, entity: Entity, component: &C) {
        for hook in self.on_added.iter_mut() {
            hook(entity, component);
        }
    }

    pub fn removed(&mut self, entity: Entity, component: &C) {
        for hook in self.on_removed.iter_mut() {
            hook(entity, component);
        }
    }
}

impl<C> Default for StorageHooks<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    fn hooks_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = StorageHooks::<u32>::new();

        let first = log.clone();
        hooks.push_added(Box::new(move |entity: Entity, value: &u32| {
            first.borrow_mut().push(("first", entity, *value))
        }));
        let second = log.clone();
        hooks.push_added(Box::new(move |entity: Entity, value: &u32| {
            second.borrow_mut().push(("second", entity, *value))
        }));

        hooks.added(7, &42);
        hooks.removed(7, &42);

        assert_eq!(*log.borrow(), vec![("first", 7, 42), ("second", 7, 42)]);
    }
}
