//! Windows, monitors and input
//!
//! Typed wrappers over toolkit objects. Every call goes through the toolkit
//! thread, so these types may be used from any thread.

pub mod callbacks;
pub mod handle;
pub mod input;
pub mod monitor;
pub mod state;

pub use callbacks::{SharedCallbacks, WindowCallbacks};
pub use handle::{WindowHandle, WindowedGeometry};
pub use input::{Key, KeyAction, Modifiers, MouseButton};
pub use monitor::{MonitorHandle, MonitorMode};
pub use state::WindowState;
