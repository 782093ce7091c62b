use thiserror::Error;

use crate::{entity::Entity, inspector::AttributeError};

/// Usage errors reported by [World](crate::World) operations.
///
/// Every fallible operation checks its preconditions before touching any table, so an `Err`
/// always means the world is unchanged.
#[derive(Debug, Error)]
pub enum EcsError {
    /// The id was never allocated, has been removed, or is currently inactive.
    #[error("entity {0} is not alive")]
    UnknownEntity(Entity),

    #[error("entity {0} has already been allocated")]
    DuplicateEntity(Entity),

    /// Every id up to `Entity::MAX` has been handed out.
    #[error("no entity ids left to allocate")]
    EntityIdsExhausted,

    #[error("entity {entity} already has a component of kind `{kind}`")]
    DuplicateComponent { entity: Entity, kind: &'static str },

    /// No store was ever created for the component kind.
    #[error("no component store exists for kind `{0}`")]
    UnknownComponentKind(&'static str),

    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

pub type Result<T, E = EcsError> = core::result::Result<T, E>;
