pub mod component;
mod config;
pub mod entity;
mod error;
pub mod event;
pub mod inspector;
mod world;

pub use component::storage::ComponentStorage;
pub use component::{Component, ComponentID, ComponentKind};
pub use config::WorldConfig;
pub use entity::{Entity, EntityState};
pub use error::{EcsError, Result};
pub use event::{DetachedComponent, EntityEvent, EntityEventKind, Events};
pub use inspector::{AttributeBag, AttributeError, Blueprint, Inspect};
pub use world::*;
