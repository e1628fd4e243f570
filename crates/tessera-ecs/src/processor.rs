use std::any::{type_name, Any, TypeId};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::world::World;

/// A callback run once per frame by [`Schedule::run`].
///
/// Processors are plain structs; a typical implementation iterates entities
/// with one or more query calls on the world it is handed. The `Any`
/// supertrait lets a schedule find and remove processors by their type.
pub trait Processor: Any {
    fn process(&mut self, world: &mut World);
}

struct Entry {
    priority: i32,
    tag: TypeId,
    name: &'static str,
    processor: Box<dyn Processor>,
}

/// Runs processors in priority order, purging dead entities first.
pub struct Schedule {
    entries: Vec<Entry>,
    process_times: HashMap<&'static str, Duration>,
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            process_times: HashMap::new(),
        }
    }

    /// Add a processor. Higher priority runs first; equal priorities run in
    /// insertion order.
    pub fn add_processor<P: Processor>(&mut self, processor: P, priority: i32) {
        self.entries.push(Entry {
            priority,
            tag: TypeId::of::<P>(),
            name: type_name::<P>(),
            processor: Box::new(processor),
        });
        // stable sort keeps insertion order within equal priorities
        self.entries.sort_by_key(|entry| Reverse(entry.priority));
    }

    /// Remove a processor by type. Returns whether one was removed.
    pub fn remove_processor<P: Processor>(&mut self) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.tag != TypeId::of::<P>());
        self.entries.len() != before
    }

    /// Get a previously added processor by type, e.g. to call a method on it
    /// from outside (or from another processor between frames).
    pub fn get_processor<P: Processor>(&self) -> Option<&P> {
        self.entries
            .iter()
            .find(|entry| entry.tag == TypeId::of::<P>())
            .and_then(|entry| (entry.processor.as_ref() as &dyn Any).downcast_ref::<P>())
    }

    /// Mutable variant of [`Schedule::get_processor`].
    pub fn get_processor_mut<P: Processor>(&mut self) -> Option<&mut P> {
        self.entries
            .iter_mut()
            .find(|entry| entry.tag == TypeId::of::<P>())
            .and_then(|entry| (entry.processor.as_mut() as &mut dyn Any).downcast_mut::<P>())
    }

    /// Purge entities queued for deletion, then run every processor in
    /// priority order.
    pub fn run(&mut self, world: &mut World) {
        world.clear_dead_entities();
        for entry in &mut self.entries {
            entry.processor.process(world);
        }
    }

    /// Same as [`Schedule::run`], additionally recording each processor's
    /// elapsed wall time for inspection via [`Schedule::process_times`].
    pub fn run_timed(&mut self, world: &mut World) {
        world.clear_dead_entities();
        let Self {
            entries,
            process_times,
        } = self;
        for entry in entries {
            let start = Instant::now();
            entry.processor.process(world);
            process_times.insert(entry.name, start.elapsed());
        }
    }

    /// Per-processor wall times recorded by the last [`Schedule::run_timed`].
    pub fn process_times(&self) -> &HashMap<&'static str, Duration> {
        &self.process_times
    }

    /// Number of processors in the schedule.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}
