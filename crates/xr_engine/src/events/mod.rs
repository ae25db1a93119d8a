//! Event dispatcher
//!
//! Key principles:
//! - Typed events (one enum variant per event, payload carried inline)
//! - Handler returns bool (true = consumed, stops forwarding)
//! - Registration system (only notify handlers connected to the event type)
//! - Immediate (`send`) and deferred (`post` + `dispatch`) delivery
//!
//! Hierarchy events that drive sort-order recomputation must be delivered
//! with `send` so the update lands before the same frame is rendered.

use crate::ecs::Entity;
use crate::foundation::hash::HashValue;
use std::collections::HashMap;

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// An entity was attached to a different parent
    ParentChangedImmediate,
    /// An entity moved within its parent's child list
    ChildIndexChangedImmediate,
    /// A render component's mesh was replaced
    MeshChanged,
    /// A render component has every asset it needs loaded
    ReadyToRender,
    /// A render component was hidden
    Hidden,
    /// A render component was shown
    Unhidden,
    /// A texture bound to a render component finished loading
    TextureReady,
}

/// Events exchanged between the scene subsystems
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Sent synchronously when `target` changes parent
    ParentChangedImmediate {
        /// Entity whose parent changed
        target: Entity,
        /// Previous parent, `Entity::NULL` if it was a root
        old_parent: Entity,
        /// New parent, `Entity::NULL` if it is now a root
        new_parent: Entity,
    },
    /// Sent synchronously when `target` moves within its sibling list
    ChildIndexChangedImmediate {
        /// Entity that moved
        target: Entity,
        /// Parent whose child list was reordered
        parent: Entity,
        /// Previous sibling index
        old_index: usize,
        /// New sibling index
        new_index: usize,
    },
    /// The mesh of a render component changed
    MeshChanged {
        /// Owning entity
        target: Entity,
        /// Pass holding the component
        pass: HashValue,
    },
    /// All of a render component's assets are loaded
    ReadyToRender {
        /// Owning entity
        target: Entity,
        /// Pass holding the component
        pass: HashValue,
    },
    /// A render component was hidden
    Hidden {
        /// Owning entity
        target: Entity,
    },
    /// A render component was shown
    Unhidden {
        /// Owning entity
        target: Entity,
    },
    /// A texture finished loading
    TextureReady {
        /// Owning entity
        target: Entity,
        /// Texture unit the texture is bound to
        texture_unit: u32,
    },
}

impl Event {
    /// Type of this event, used to route it to handlers
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::ParentChangedImmediate { .. } => EventType::ParentChangedImmediate,
            Self::ChildIndexChangedImmediate { .. } => EventType::ChildIndexChangedImmediate,
            Self::MeshChanged { .. } => EventType::MeshChanged,
            Self::ReadyToRender { .. } => EventType::ReadyToRender,
            Self::Hidden { .. } => EventType::Hidden,
            Self::Unhidden { .. } => EventType::Unhidden,
            Self::TextureReady { .. } => EventType::TextureReady,
        }
    }

    /// Entity the event is about
    pub const fn target(&self) -> Entity {
        match self {
            Self::ParentChangedImmediate { target, .. }
            | Self::ChildIndexChangedImmediate { target, .. }
            | Self::MeshChanged { target, .. }
            | Self::ReadyToRender { target, .. }
            | Self::Hidden { target }
            | Self::Unhidden { target }
            | Self::TextureReady { target, .. } => *target,
        }
    }
}

/// Event handler trait
/// Returns true if event was consumed (stops forwarding)
/// Returns false to allow forwarding to other handlers
pub trait EventHandler {
    /// Handle an event, return true if consumed
    fn on_event(&mut self, event: &Event) -> bool;
}

impl<F: FnMut(&Event) -> bool> EventHandler for F {
    fn on_event(&mut self, event: &Event) -> bool {
        self(event)
    }
}

/// Handle returned by [`Dispatcher::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// Pub/sub event bus with registration and queuing
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<EventType, Vec<(ConnectionId, Box<dyn EventHandler>)>>,
    queue: Vec<Event>,
    next_connection: u64,
}

impl Dispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a specific event type
    /// Only handlers registered for this type will be notified
    pub fn connect(
        &mut self,
        event_type: EventType,
        handler: impl EventHandler + 'static,
    ) -> ConnectionId {
        self.next_connection += 1;
        let id = ConnectionId(self.next_connection);
        self.handlers
            .entry(event_type)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns false if the connection was unknown.
    pub fn disconnect(&mut self, connection: ConnectionId) -> bool {
        for handlers in self.handlers.values_mut() {
            if let Some(pos) = handlers.iter().position(|(id, _)| *id == connection) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver an event to its handlers right away.
    /// Returns whether a handler consumed it.
    pub fn send(&mut self, event: &Event) -> bool {
        let Some(handlers) = self.handlers.get_mut(&event.event_type()) else {
            return false;
        };
        for (_, handler) in handlers.iter_mut() {
            if handler.on_event(event) {
                return true;
            }
        }
        false
    }

    /// Queue an event for the next [`Dispatcher::dispatch`]
    pub fn post(&mut self, event: Event) {
        self.queue.push(event);
    }

    /// Deliver all queued events in posting order, returning how many were delivered
    pub fn dispatch(&mut self) -> usize {
        let queued = std::mem::take(&mut self.queue);
        for event in &queued {
            self.send(event);
        }
        queued.len()
    }

    /// Number of events waiting for dispatch
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Number of handlers connected to an event type
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers.get(&event_type).map_or(0, Vec::len)
    }

    /// Clear all queued events
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn hidden(id: u32) -> Event {
        Event::Hidden {
            target: Entity::from_raw(id),
        }
    }

    #[test]
    fn test_immediate_dispatch() {
        let mut dispatcher = Dispatcher::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        dispatcher.connect(EventType::Hidden, move |event: &Event| {
            sink.borrow_mut().push(event.target());
            false
        });

        assert!(!dispatcher.send(&hidden(3)));
        assert!(!dispatcher.send(&Event::Unhidden {
            target: Entity::from_raw(4)
        }));
        assert_eq!(*seen.borrow(), vec![Entity::from_raw(3)]);
    }

    #[test]
    fn test_deferred_dispatch() {
        let mut dispatcher = Dispatcher::new();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        dispatcher.connect(EventType::Hidden, move |_: &Event| {
            *sink.borrow_mut() += 1;
            false
        });

        dispatcher.post(hidden(1));
        dispatcher.post(hidden(2));
        assert_eq!(*count.borrow(), 0);
        assert_eq!(dispatcher.pending(), 2);
        assert_eq!(dispatcher.dispatch(), 2);
        assert_eq!(*count.borrow(), 2);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_event_consumption() {
        let mut dispatcher = Dispatcher::new();
        let second_called = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&second_called);
        dispatcher.connect(EventType::Hidden, |_: &Event| true);
        dispatcher.connect(EventType::Hidden, move |_: &Event| {
            *flag.borrow_mut() = true;
            false
        });

        assert!(dispatcher.send(&hidden(1)));
        assert!(!*second_called.borrow());
    }

    #[test]
    fn test_disconnect() {
        let mut dispatcher = Dispatcher::new();
        let id = dispatcher.connect(EventType::TextureReady, |_: &Event| true);
        assert_eq!(dispatcher.handler_count(EventType::TextureReady), 1);
        assert!(dispatcher.disconnect(id));
        assert!(!dispatcher.disconnect(id));
        assert_eq!(dispatcher.handler_count(EventType::TextureReady), 0);
    }
}
