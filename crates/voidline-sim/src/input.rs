//! Edge-triggered key dispatch.
//!
//! The platform layer reports raw key transitions into a [`KeyboardState`];
//! once per frame [`InputDispatcher::update`] asks a [`KeyStateSource`] which
//! registered keys were pressed this frame and runs their handlers.
//!
//! The registry uses interior mutability so handlers can subscribe or
//! unsubscribe (through a captured `Rc`/`Weak` to the dispatcher) while a
//! dispatch is in progress. Dispatch iterates over a snapshot of the
//! registered keys, and over a snapshot of each key's handler list taken
//! when that key is reached.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::error;

use voidline_core::enums::Key;

/// Per-frame press-edge oracle provided by the platform input layer.
pub trait KeyStateSource {
    /// True if `key` went from released to pressed during the current frame.
    fn pressed_this_frame(&self, key: Key) -> bool;
}

/// A registered key callback. Two handles are equal only if they share
/// the same allocation, so keep a clone of the handle you subscribed in
/// order to unsubscribe it later.
#[derive(Clone)]
pub struct KeyHandler(Rc<dyn Fn()>);

impl KeyHandler {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    fn call(&self) {
        (self.0)()
    }
}

impl PartialEq for KeyHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for KeyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHandler({:p})", Rc::as_ptr(&self.0))
    }
}

/// Counters for one `update` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub invoked: u32,
    pub faults: u32,
}

#[derive(Debug, Default)]
pub struct InputDispatcher {
    handlers: RefCell<BTreeMap<Key, Vec<KeyHandler>>>,
}

impl InputDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `key`.
    pub fn subscribe(&self, key: Key, handler: KeyHandler) {
        self.handlers.borrow_mut().entry(key).or_default().push(handler);
    }

    /// Remove the first registration of `handler` for `key`. Returns whether
    /// anything was removed; unknown keys and handlers are a no-op.
    pub fn unsubscribe(&self, key: Key, handler: &KeyHandler) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let Some(list) = handlers.get_mut(&key) else {
            return false;
        };
        let Some(index) = list.iter().position(|h| h == handler) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            handlers.remove(&key);
        }
        true
    }

    pub fn handler_count(&self, key: Key) -> usize {
        self.handlers.borrow().get(&key).map_or(0, Vec::len)
    }

    pub fn is_registered(&self, key: Key) -> bool {
        self.handlers.borrow().contains_key(&key)
    }

    pub fn registered_keys(&self) -> Vec<Key> {
        self.handlers.borrow().keys().copied().collect()
    }

    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }

    /// Run once per frame. A panicking handler is logged and skipped; the
    /// rest of the frame's handlers still run.
    pub fn update(&self, keys: &dyn KeyStateSource) -> DispatchStats {
        let mut stats = DispatchStats::default();
        let registered = self.registered_keys();

        for key in registered {
            if !keys.pressed_this_frame(key) {
                continue;
            }
            let handlers = self.handlers.borrow().get(&key).cloned();
            let Some(handlers) = handlers else {
                continue;
            };

            for handler in handlers {
                match panic::catch_unwind(AssertUnwindSafe(|| handler.call())) {
                    Ok(()) => stats.invoked += 1,
                    Err(payload) => {
                        stats.faults += 1;
                        error!(
                            key = ?key,
                            handler = ?handler,
                            fault = panic_message(payload.as_ref()),
                            "input_handler_fault"
                        );
                    }
                }
            }
        }

        stats
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Level state plus per-frame press edges, fed by raw key events.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    down: HashSet<Key>,
    pressed_edges: HashSet<Key>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw transition. Auto-repeat presses of a held key are not edges.
    pub fn handle_key(&mut self, key: Key, pressed: bool) {
        if pressed {
            if self.down.insert(key) {
                self.pressed_edges.insert(key);
            }
        } else {
            self.down.remove(&key);
        }
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.down.contains(&key)
    }

    /// Forget this frame's edges. Call after the dispatcher has run.
    pub fn end_frame(&mut self) {
        self.pressed_edges.clear();
    }

    pub fn release_all(&mut self) {
        self.down.clear();
    }
}

impl KeyStateSource for KeyboardState {
    fn pressed_this_frame(&self, key: Key) -> bool {
        self.pressed_edges.contains(&key)
    }
}
