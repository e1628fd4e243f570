//! Tessera ECS - entity component store
//!
//! An in-process database mapping integer entity ids to typed component
//! values, with deferred entity deletion and memoized single- and multi-type
//! queries. Single-threaded by design: no locking, no background work, and
//! queries return materialized snapshots.

mod component;
mod entity;
mod error;
mod processor;
mod query;
mod registry;
mod world;

pub use component::{Bundle, Component};
pub use entity::Entity;
pub use error::EcsError;
pub use processor::{Processor, Schedule};
pub use query::ComponentTuple;
pub use registry::{Worlds, WorldsError};
pub use world::World;
