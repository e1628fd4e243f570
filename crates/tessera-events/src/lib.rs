//! Tessera Events - name-keyed event dispatch
//!
//! A small publish/subscribe registry, fully independent of the entity
//! store. Handlers are owned by the bus and unsubscribed with the
//! [`HandlerId`] returned at registration time.

use std::any::Any;
use std::collections::HashMap;

use tracing::trace;

/// Token identifying one registered handler, used to unsubscribe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&dyn Any)>;

/// Registry of named event handlers.
pub struct EventBus {
    handlers: HashMap<String, Vec<(HandlerId, Handler)>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a handler for a named event. The handler receives every
    /// payload dispatched under that name, untyped.
    pub fn set_handler(
        &mut self,
        name: &str,
        handler: impl FnMut(&dyn Any) + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(name.to_string())
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Register a handler that only receives payloads of type `T`; payloads
    /// of any other type pass it by.
    pub fn on<T: 'static>(&mut self, name: &str, mut handler: impl FnMut(&T) + 'static) -> HandlerId {
        self.set_handler(name, move |payload| {
            if let Some(payload) = payload.downcast_ref::<T>() {
                handler(payload);
            }
        })
    }

    /// Unregister a handler. Passes silently if the name or id is unknown;
    /// returns whether a handler was removed.
    pub fn remove_handler(&mut self, name: &str, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(handler_id, _)| *handler_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(name);
        }
        removed
    }

    /// Invoke every handler registered under `name` with the given payload.
    /// Passes silently when no handlers are set.
    pub fn dispatch(&mut self, name: &str, payload: &dyn Any) {
        let Some(list) = self.handlers.get_mut(name) else {
            trace!(event = name, "event dispatched with no handlers");
            return;
        };
        for (_, handler) in list.iter_mut() {
            handler(payload);
        }
    }

    /// Number of handlers currently registered under `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.get(name).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
