use crate::entity::Entity;

/// Errors returned by entity and component operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The entity was never created, or has already been purged.
    #[error("entity {0} does not exist")]
    UnknownEntity(Entity),

    /// The entity is valid but holds no component under the requested type.
    #[error("entity {0} has no {1} component")]
    MissingComponent(Entity, &'static str),

    /// A dynamic query was issued with an empty list of component types.
    #[error("a query requires at least one component type")]
    EmptyQuery,
}
