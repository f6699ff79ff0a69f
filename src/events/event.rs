//! Signal/slot style event sources.
//!
//! Handlers fire in reverse insertion order and short-circuit on the
//! first truthy return. A panicking handler is caught and logged; the
//! remaining handlers still run.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::events::keys::{Modifiers, MouseButton};

/// Arguments delivered to every event handler.
#[derive(Debug, Clone, Default)]
pub struct EventArgs {
    /// Position in figure pixels.
    pub x: f32,
    pub y: f32,
    /// Position in the owning axes' 2-D world coordinates, when the event
    /// passed through an axes.
    pub x2d: f64,
    pub y2d: f64,
    pub button: Option<MouseButton>,
    /// Key code, see [`crate::events::keys::key`].
    pub key: Option<u32>,
    /// Unicode text for key presses, empty otherwise.
    pub text: String,
    pub modifiers: Modifiers,
}

impl EventArgs {
    pub fn at(x: f32, y: f32) -> Self {
        EventArgs {
            x,
            y,
            ..Default::default()
        }
    }
}

type Handler = Box<dyn FnMut(&EventArgs) -> bool>;

/// Identifies a bound handler so it can be unbound later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// An event source owned by a scene object.
#[derive(Default)]
pub struct EventSource {
    handlers: Vec<(HandlerId, Handler)>,
    next_id: u64,
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl EventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Handlers registered later fire earlier.
    pub fn bind<F>(&mut self, f: F) -> HandlerId
    where
        F: FnMut(&EventArgs) -> bool + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(f)));
        id
    }

    /// Remove a handler. Unknown ids are ignored.
    pub fn unbind(&mut self, id: HandlerId) {
        self.handlers.retain(|(hid, _)| *hid != id);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Fire all handlers in reverse insertion order.
    ///
    /// Returns true when some handler returned true (the event is
    /// handled). Panics inside handlers are caught and logged, never
    /// propagated; subsequent handlers still run.
    pub fn fire(&mut self, args: &EventArgs) -> bool {
        for (_, handler) in self.handlers.iter_mut().rev() {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(args)));
            match outcome {
                Ok(true) => return true,
                Ok(false) => {}
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "<non-string panic>".into());
                    log::error!(target: "sciviz", "event handler panicked: {msg}");
                }
            }
        }
        false
    }
}

/// The full set of event sources on a scene object.
#[derive(Debug, Default)]
pub struct ObjectEvents {
    pub mouse_down: EventSource,
    pub mouse_up: EventSource,
    pub double_click: EventSource,
    pub enter: EventSource,
    pub leave: EventSource,
    pub motion: EventSource,
    pub key_down: EventSource,
    pub key_up: EventSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn handlers_fire_in_reverse_order_until_truthy() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut src = EventSource::new();
        for i in 1..=3 {
            let order = order.clone();
            // h2 claims the event, so h1 must never fire.
            src.bind(move |_| {
                order.borrow_mut().push(i);
                i == 2
            });
        }
        let handled = src.fire(&EventArgs::default());
        assert!(handled);
        assert_eq!(*order.borrow(), vec![3, 2]);
    }

    #[test]
    fn panicking_handler_does_not_stop_dispatch() {
        let hits = Rc::new(RefCell::new(0));
        let mut src = EventSource::new();
        {
            let hits = hits.clone();
            src.bind(move |_| {
                *hits.borrow_mut() += 1;
                false
            });
        }
        src.bind(|_| panic!("boom"));
        let handled = src.fire(&EventArgs::default());
        assert!(!handled);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn unbind_removes_handler() {
        let mut src = EventSource::new();
        let id = src.bind(|_| true);
        assert!(src.fire(&EventArgs::default()));
        src.unbind(id);
        assert!(!src.fire(&EventArgs::default()));
        assert_eq!(src.handler_count(), 0);
    }
}
