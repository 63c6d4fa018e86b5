//! Named callbacks for host-pushed events.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tkpainter_shared::InboundEvent;

pub type Callback = Rc<dyn Fn(&InboundEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

/// Event name -> callbacks, kept in registration order.
///
/// Mutation goes through `&self` so callbacks can register or unregister
/// while an event is being delivered.
#[derive(Default)]
pub struct CallbackRegistry {
    next_id: Cell<u64>,
    callbacks: RefCell<HashMap<String, Vec<(CallbackHandle, Callback)>>>,
}

impl CallbackRegistry {
    pub fn register(&self, event: &str, callback: Callback) -> CallbackHandle {
        let handle = CallbackHandle(self.next_id.get());
        self.next_id.set(handle.0 + 1);
        self.callbacks
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push((handle, callback));
        tracing::debug!(event, handle = handle.0, "Registered callback");
        handle
    }

    /// Remove one callback. Unknown handles are ignored.
    pub fn unregister(&self, event: &str, handle: CallbackHandle) -> bool {
        let mut callbacks = self.callbacks.borrow_mut();
        let Some(entries) = callbacks.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != handle);
        let removed = entries.len() != before;
        if entries.is_empty() {
            callbacks.remove(event);
        }
        removed
    }

    pub fn count(&self, event: &str) -> usize {
        self.callbacks.borrow().get(event).map_or(0, Vec::len)
    }

    /// Run every callback registered under the event's name.
    ///
    /// Works on a snapshot: changes made by a callback apply to the next event.
    pub fn invoke(&self, event: &InboundEvent) -> usize {
        let snapshot: Vec<Callback> = self
            .callbacks
            .borrow()
            .get(event.name())
            .map(|entries| entries.iter().map(|(_, cb)| Rc::clone(cb)).collect())
            .unwrap_or_default();

        for callback in &snapshot {
            callback(event);
        }
        snapshot.len()
    }
}
