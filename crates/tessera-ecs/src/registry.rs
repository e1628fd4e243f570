use std::collections::HashMap;

use tracing::debug;

use crate::world::World;

/// Errors from the named world registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldsError {
    /// The active world cannot be deleted.
    #[error("world {0:?} is active and cannot be deleted")]
    ActiveWorld(String),

    /// No world is registered under the given name.
    #[error("no world named {0:?}")]
    UnknownWorld(String),
}

/// A caller-owned registry of named [`World`] contexts with one active
/// context. Contexts share nothing: each has its own entities, components,
/// and id sequence.
///
/// Starts with an active world named `"default"`.
pub struct Worlds {
    map: HashMap<String, World>,
    current: String,
}

impl Worlds {
    pub fn new() -> Self {
        let mut map = HashMap::new();
        map.insert("default".to_string(), World::new());
        Self {
            map,
            current: "default".to_string(),
        }
    }

    /// The active world.
    pub fn current(&self) -> &World {
        self.map.get(&self.current).expect("active world exists")
    }

    /// The active world, mutably.
    pub fn current_mut(&mut self) -> &mut World {
        self.map
            .get_mut(&self.current)
            .expect("active world exists")
    }

    /// Name of the active world.
    pub fn current_name(&self) -> &str {
        &self.current
    }

    /// Switch to a named world, creating an empty one on first use.
    pub fn switch(&mut self, name: &str) -> &mut World {
        self.current = name.to_string();
        debug!(world = name, "switched world context");
        self.map
            .entry(name.to_string())
            .or_insert_with(World::new)
    }

    /// Delete a world by name, returning it. The active world cannot be
    /// deleted.
    pub fn delete(&mut self, name: &str) -> Result<World, WorldsError> {
        if name == self.current {
            return Err(WorldsError::ActiveWorld(name.to_string()));
        }
        self.map
            .remove(name)
            .ok_or_else(|| WorldsError::UnknownWorld(name.to_string()))
    }

    /// Names of all registered worlds.
    pub fn list(&self) -> Vec<&str> {
        self.map.keys().map(String::as_str).collect()
    }
}

impl Default for Worlds {
    fn default() -> Self {
        Self::new()
    }
}
