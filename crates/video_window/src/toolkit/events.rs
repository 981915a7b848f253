//! Deferred window events
//!
//! The toolkit thread converts native events into [`WindowEvent`]s and pushes
//! them here together with an owned reference to the target window's callback
//! table. The application drains the queue under its instance lock, so user
//! callbacks only ever run on the application side.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::WindowKey;
use crate::window::callbacks::{SharedCallbacks, WindowCallbacks};
use crate::window::input::{Key, KeyAction, Modifiers, MouseButton};

/// A window or input event produced by the toolkit
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    /// Window moved
    Position(i32, i32),
    /// Client area resized (screen coordinates)
    Size(u32, u32),
    /// Framebuffer resized (pixels)
    Resolution(u32, u32),
    /// Content scale changed
    Scale(f32, f32),
    /// User asked to close the window
    Close,
    /// Window contents need to be redrawn
    Refresh,
    /// Input focus gained or lost
    Focus(bool),
    /// Window iconified or restored
    Iconify(bool),
    /// Window maximized or restored
    Maximize(bool),
    /// Keyboard key changed state
    Keyboard {
        /// Key
        key: Key,
        /// Platform scancode
        scancode: i32,
        /// Transition
        action: KeyAction,
        /// Held modifiers
        modifiers: Modifiers,
    },
    /// Unicode character input
    Character(char),
    /// Mouse button changed state
    MouseButton {
        /// Button
        button: MouseButton,
        /// Transition
        action: KeyAction,
        /// Held modifiers
        modifiers: Modifiers,
    },
    /// Cursor moved within the client area
    MousePosition(f64, f64),
    /// Cursor entered or left the client area
    CursorEnter(bool),
    /// Scroll wheel or trackpad scroll
    Scroll(f64, f64),
}

struct PendingEvent {
    key: WindowKey,
    event: WindowEvent,
    callbacks: SharedCallbacks,
}

/// FIFO of events waiting to be dispatched on the application thread
#[derive(Clone, Default)]
pub struct EventQueue {
    pending: Arc<Mutex<VecDeque<PendingEvent>>>,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the window whose callbacks are `callbacks`
    pub(crate) fn push(&self, key: WindowKey, event: WindowEvent, callbacks: SharedCallbacks) {
        self.pending.lock().push_back(PendingEvent { key, event, callbacks });
    }

    /// Drop every queued event for `key`, returning how many were removed
    pub fn purge(&self, key: WindowKey) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|event| event.key != key);
        before - pending.len()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether no events are queued
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Invoke the callbacks of every queued event, in arrival order
    ///
    /// Neither the queue lock nor a window's callback table lock is held while
    /// a callback runs. Callbacks may queue further events, which are left for
    /// the next dispatch, and may edit their own window's table.
    pub fn dispatch(&self) -> usize {
        let drained: Vec<PendingEvent> = self.pending.lock().drain(..).collect();
        let count = drained.len();
        for pending in drained {
            WindowCallbacks::dispatch(&pending.callbacks, &pending.event);
        }
        count
    }
}
