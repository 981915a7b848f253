//! Native windowing toolkit access
//!
//! Every call into the native toolkit happens on one dedicated thread. The
//! [`Toolkit`] trait is the surface of that native library as seen from that
//! thread; [`ToolkitThread`] owns the thread and [`ToolkitHandle`] marshals
//! requests onto it from anywhere else.
//!
//! Window events produced by the toolkit never reach user code on the toolkit
//! thread. They are queued in an [`EventQueue`] keyed by [`WindowKey`] and
//! dispatched later by the application under its instance lock.

pub mod events;
pub mod thread;

#[cfg(feature = "glfw-toolkit")]
pub mod glfw;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use thiserror::Error;

use crate::window::input::{Key, KeyAction, MouseButton};
use crate::window::monitor::MonitorMode;

pub use events::{EventQueue, WindowEvent};
pub use thread::{ToolkitHandle, ToolkitState, ToolkitThread};

/// Opaque identity of one native window
///
/// Keys come from a process-wide counter and are never reused, so a stale key
/// can never alias a newer window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey(u64);

impl WindowKey {
    /// Allocate a fresh key
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Opaque identity of one connected monitor, assigned by the toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorId(pub u64);

/// Toolkit errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolkitError {
    /// The native toolkit could not be initialized (no display backend)
    #[error("Windowing toolkit initialization failed: {0}")]
    Initialization(String),

    /// A toolkit thread already exists in this process
    #[error("A windowing toolkit thread is already running in this process")]
    AlreadyInitialized,

    /// The toolkit refused to create a window
    #[error("Window creation failed: {0}")]
    WindowCreation(String),

    /// The monitor is no longer connected
    #[error("Unknown monitor {0:?}")]
    UnknownMonitor(MonitorId),

    /// The toolkit could not create a Vulkan surface for a window
    #[error("Vulkan surface creation failed: {0}")]
    SurfaceCreation(String),
}

/// Result type for toolkit operations
pub type ToolkitResult<T> = Result<T, ToolkitError>;

/// Everything needed to create one native window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDescriptor {
    /// Client area size in screen coordinates
    pub size: (u32, u32),
    /// Title bar text
    pub title: String,
    /// Fullscreen target; `None` creates a windowed window
    pub monitor: Option<(MonitorId, MonitorMode)>,
    /// Whether the user may resize the window
    pub resizable: bool,
    /// Whether the window has decorations
    pub decorated: bool,
}

/// Snapshot of a monitor's attributes
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorInfo {
    /// Human readable name
    pub name: String,
    /// Physical size in millimetres
    pub physical_size: (i32, i32),
    /// Position of the monitor on the virtual desktop
    pub position: (i32, i32),
    /// Mode the monitor is currently using
    pub current_mode: Option<MonitorMode>,
    /// Every mode the monitor supports
    pub modes: Vec<MonitorMode>,
}

/// Visibility-type transitions a window can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowVisibility {
    /// Make the window visible
    Show,
    /// Hide the window
    Hide,
    /// Minimize the window
    Iconify,
    /// Maximize the window
    Maximize,
    /// Undo iconify/maximize
    Restore,
}

/// Thread-safe way to interrupt the toolkit's blocking event wait
pub trait ToolkitWaker: Send + Sync {
    /// Make a concurrent or subsequent [`Toolkit::wait_events`] return promptly
    fn wake(&self);
}

/// The native windowing toolkit, as seen from its own thread
///
/// Implementations are created on the toolkit thread and never leave it.
/// Methods take `&self` so that a toolkit operation may re-enter the toolkit
/// (e.g. a marshaled task that issues another request); implementations
/// keep their mutable native state behind cells.
///
/// Calling a window method with a key that was never created or was already
/// destroyed is a contract violation and panics.
pub trait Toolkit {
    /// Waker usable from any thread
    fn waker(&self) -> Arc<dyn ToolkitWaker>;

    /// Process pending native events without blocking
    fn poll_events(&self);

    /// Block until an event arrives, the waker fires or `timeout` elapses
    fn wait_events(&self, timeout: Duration);

    /// Events gathered since the last call, tagged with their window
    fn take_events(&self) -> Vec<(WindowKey, WindowEvent)>;

    /// Connected monitors, primary first
    fn monitors(&self) -> Vec<MonitorId>;

    /// The primary monitor, if any is connected
    fn primary_monitor(&self) -> Option<MonitorId>;

    /// Attributes of a connected monitor
    fn monitor_info(&self, monitor: MonitorId) -> ToolkitResult<MonitorInfo>;

    /// Create a native window identified by `key`
    fn create_window(&self, key: WindowKey, descriptor: &WindowDescriptor) -> ToolkitResult<()>;

    /// Destroy a native window
    fn destroy_window(&self, key: WindowKey);

    /// Client area size
    fn window_size(&self, key: WindowKey) -> (u32, u32);

    /// Resize the client area
    fn set_window_size(&self, key: WindowKey, size: (u32, u32));

    /// Position on the virtual desktop
    fn window_position(&self, key: WindowKey) -> (i32, i32);

    /// Move the window
    fn set_window_position(&self, key: WindowKey, position: (i32, i32));

    /// Framebuffer size in pixels
    fn framebuffer_size(&self, key: WindowKey) -> (u32, u32);

    /// Content scale (DPI ratio)
    fn content_scale(&self, key: WindowKey) -> (f32, f32);

    /// Set the title bar text
    fn set_window_title(&self, key: WindowKey, title: &str);

    /// Whole-window opacity
    fn window_opacity(&self, key: WindowKey) -> f32;

    /// Set whole-window opacity
    fn set_window_opacity(&self, key: WindowKey, opacity: f32);

    /// Whether the window is decorated
    fn is_decorated(&self, key: WindowKey) -> bool;

    /// Toggle decorations
    fn set_decorated(&self, key: WindowKey, decorated: bool);

    /// Whether the window is user-resizable
    fn is_resizable(&self, key: WindowKey) -> bool;

    /// Toggle user resizing
    fn set_resizable(&self, key: WindowKey, resizable: bool);

    /// Enter fullscreen on `monitor`, or return to windowed mode at
    /// `position`/`size` when `monitor` is `None`
    fn set_window_monitor(
        &self,
        key: WindowKey,
        monitor: Option<(MonitorId, MonitorMode)>,
        position: (i32, i32),
        size: (u32, u32),
    );

    /// Show, hide, iconify, maximize or restore
    fn set_visibility(&self, key: WindowKey, visibility: WindowVisibility);

    /// Whether the user asked to close the window
    fn should_close(&self, key: WindowKey) -> bool;

    /// Set or clear the close request
    fn set_should_close(&self, key: WindowKey, should_close: bool);

    /// Last known state of a keyboard key
    fn key_state(&self, key: WindowKey, keyboard_key: Key) -> KeyAction;

    /// Last known state of a mouse button
    fn mouse_button_state(&self, key: WindowKey, button: MouseButton) -> KeyAction;

    /// Cursor position relative to the client area
    fn cursor_position(&self, key: WindowKey) -> (f64, f64);

    /// Vulkan instance extensions needed to present to toolkit windows
    fn required_instance_extensions(&self) -> Vec<String>;

    /// Create a Vulkan surface for a window
    fn create_surface(&self, key: WindowKey, instance: vk::Instance) -> ToolkitResult<vk::SurfaceKHR>;
}
