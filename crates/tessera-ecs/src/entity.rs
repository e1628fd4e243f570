use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque identifier for a bundle of components. Carries no data itself.
///
/// Ids are handed out by the world in a strictly increasing sequence starting
/// from 1 and are never reused within one database lifetime. Clearing the
/// database restarts the sequence, so ids are not globally unique across a
/// clear.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity(pub(crate) u64);

impl Entity {
    /// Create an entity handle from a raw id (mainly for testing).
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw id value.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues entity ids as a monotonic counter. Ids are never recycled; deleted
/// entities leave permanent gaps in the sequence.
pub(crate) struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id, strictly greater than all previously returned.
    pub fn allocate(&mut self) -> Entity {
        let entity = Entity(self.next);
        self.next += 1;
        entity
    }

    /// Restart the sequence from 1.
    pub fn reset(&mut self) {
        self.next = 1;
    }
}
