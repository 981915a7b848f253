//! Coarse window state machine

use serde::{Deserialize, Serialize};

/// Visibility state of a window as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindowState {
    /// Visible, windowed
    #[default]
    Normal,
    /// Not shown
    Hidden,
    /// Fullscreen on the primary monitor
    Fullscreen,
    /// Minimized
    Iconified,
    /// Maximized
    Maximized,
}
