//! User callback table for one window

use std::sync::Arc;

use parking_lot::Mutex;

use super::input::{Key, KeyAction, Modifiers, MouseButton};
use super::state::WindowState;
use crate::toolkit::WindowEvent;

/// Boxed user callback taking one argument
pub type Callback<A> = Box<dyn FnMut(A) + Send>;

/// Callback table shared between a window and its queued events
pub type SharedCallbacks = Arc<Mutex<WindowCallbacks>>;

/// Keyboard callback: key, scancode, action, modifiers
pub type KeyboardCallback = Box<dyn FnMut(Key, i32, KeyAction, Modifiers) + Send>;

/// Mouse button callback: button, action, modifiers
pub type MouseButtonCallback = Box<dyn FnMut(MouseButton, KeyAction, Modifiers) + Send>;

/// Callbacks invoked when queued window events are dispatched
///
/// Every field is optional; events without a callback are dropped. The table
/// belongs to the consumer and outlives any single native window.
#[derive(Default)]
pub struct WindowCallbacks {
    /// Window state changed (iconified, maximized, restored)
    pub state: Option<Callback<WindowState>>,
    /// Window moved
    pub position: Option<Callback<(i32, i32)>>,
    /// Client area resized
    pub size: Option<Callback<(u32, u32)>>,
    /// Framebuffer resized
    pub resolution: Option<Callback<(u32, u32)>>,
    /// Content scale changed
    pub scale: Option<Callback<(f32, f32)>>,
    /// Close requested
    pub close: Option<Callback<()>>,
    /// Contents damaged
    pub refresh: Option<Callback<()>>,
    /// Focus gained or lost
    pub focus: Option<Callback<bool>>,
    /// Keyboard input
    pub keyboard: Option<KeyboardCallback>,
    /// Text input
    pub character: Option<Callback<char>>,
    /// Mouse button input
    pub mouse_button: Option<MouseButtonCallback>,
    /// Cursor moved
    pub mouse_position: Option<Callback<(f64, f64)>>,
    /// Cursor entered or left
    pub cursor_enter: Option<Callback<bool>>,
    /// Scrolled
    pub scroll: Option<Callback<(f64, f64)>>,

    signals: WindowSignals,
}

/// Internal notifications the owning consumer reacts to after dispatch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowSignals {
    pub resolution: Option<(u32, u32)>,
    pub refresh: bool,
}

impl WindowCallbacks {
    /// Empty table behind a shared lock
    pub fn shared() -> SharedCallbacks {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Take internal notifications gathered since the last call
    pub(crate) fn take_signals(&mut self) -> WindowSignals {
        std::mem::take(&mut self.signals)
    }

    /// Route one event to its callback
    ///
    /// The table lock is released while the callback runs: the callback is
    /// taken out of its slot for the call, so it may edit the table or
    /// replace itself. A replacement installed during the call is kept;
    /// clearing the callback's own slot from inside the call does not stick.
    pub fn dispatch(table: &SharedCallbacks, event: &WindowEvent) {
        match *event {
            WindowEvent::Position(x, y) => call(table, |t| &mut t.position, (x, y)),
            WindowEvent::Size(w, h) => call(table, |t| &mut t.size, (w, h)),
            WindowEvent::Resolution(w, h) => {
                table.lock().signals.resolution = Some((w, h));
                call(table, |t| &mut t.resolution, (w, h));
            }
            WindowEvent::Scale(x, y) => call(table, |t| &mut t.scale, (x, y)),
            WindowEvent::Close => call(table, |t| &mut t.close, ()),
            WindowEvent::Refresh => {
                table.lock().signals.refresh = true;
                call(table, |t| &mut t.refresh, ());
            }
            WindowEvent::Focus(focused) => call(table, |t| &mut t.focus, focused),
            WindowEvent::Iconify(iconified) => {
                let state = if iconified { WindowState::Iconified } else { WindowState::Normal };
                call(table, |t| &mut t.state, state);
            }
            WindowEvent::Maximize(maximized) => {
                let state = if maximized { WindowState::Maximized } else { WindowState::Normal };
                call(table, |t| &mut t.state, state);
            }
            WindowEvent::Keyboard { key, scancode, action, modifiers } => {
                with_slot(table, |t| &mut t.keyboard, |callback| callback(key, scancode, action, modifiers));
            }
            WindowEvent::Character(c) => call(table, |t| &mut t.character, c),
            WindowEvent::MouseButton { button, action, modifiers } => {
                with_slot(table, |t| &mut t.mouse_button, |callback| callback(button, action, modifiers));
            }
            WindowEvent::MousePosition(x, y) => call(table, |t| &mut t.mouse_position, (x, y)),
            WindowEvent::CursorEnter(entered) => call(table, |t| &mut t.cursor_enter, entered),
            WindowEvent::Scroll(x, y) => call(table, |t| &mut t.scroll, (x, y)),
        }
    }
}

type Slot<T> = fn(&mut WindowCallbacks) -> &mut Option<T>;

fn call<A>(table: &SharedCallbacks, slot: Slot<Callback<A>>, arg: A) {
    with_slot(table, slot, |callback| callback(arg));
}

/// Run the callback in `slot` with the table unlocked, then put it back
/// unless the slot was refilled meanwhile
fn with_slot<T>(table: &SharedCallbacks, slot: Slot<T>, invoke: impl FnOnce(&mut T)) {
    let taken = slot(&mut table.lock()).take();
    let Some(mut callback) = taken else {
        return;
    };
    invoke(&mut callback);

    let mut guard = table.lock();
    let current = slot(&mut guard);
    if current.is_none() {
        *current = Some(callback);
    }
}

impl std::fmt::Debug for WindowCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowCallbacks")
            .field("state", &self.state.is_some())
            .field("position", &self.position.is_some())
            .field("size", &self.size.is_some())
            .field("resolution", &self.resolution.is_some())
            .field("keyboard", &self.keyboard.is_some())
            .field("mouse_button", &self.mouse_button.is_some())
            .finish_non_exhaustive()
    }
}
