//! Monitor queries

use serde::{Deserialize, Serialize};

use crate::toolkit::{MonitorId, MonitorInfo, ToolkitHandle, ToolkitResult};

/// One video mode of a monitor
///
/// The single mode type used by the toolkit layer, windows and consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorMode {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bit depth of the red channel
    pub red_bits: u32,
    /// Bit depth of the green channel
    pub green_bits: u32,
    /// Bit depth of the blue channel
    pub blue_bits: u32,
    /// Refresh rate in Hz
    pub refresh_rate: u32,
}

impl MonitorMode {
    /// 8 bits per channel mode
    pub fn new(width: u32, height: u32, refresh_rate: u32) -> Self {
        Self {
            width,
            height,
            red_bits: 8,
            green_bits: 8,
            blue_bits: 8,
            refresh_rate,
        }
    }

    /// Resolution as a tuple
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Query wrapper over one connected monitor
///
/// Holds no state of its own; every accessor asks the toolkit. Two handles
/// are equal when they refer to the same monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    id: MonitorId,
    toolkit: ToolkitHandle,
}

impl PartialEq for MonitorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MonitorHandle {}

impl MonitorHandle {
    pub(crate) fn new(id: MonitorId, toolkit: ToolkitHandle) -> Self {
        Self { id, toolkit }
    }

    /// Every connected monitor, primary first
    pub fn all(toolkit: &ToolkitHandle) -> Vec<Self> {
        toolkit
            .execute(|tk| tk.monitors())
            .into_iter()
            .map(|id| Self::new(id, toolkit.clone()))
            .collect()
    }

    /// The primary monitor
    pub fn primary(toolkit: &ToolkitHandle) -> Option<Self> {
        toolkit
            .execute(|tk| tk.primary_monitor())
            .map(|id| Self::new(id, toolkit.clone()))
    }

    /// Toolkit identity
    pub fn id(&self) -> MonitorId {
        self.id
    }

    fn info(&self) -> ToolkitResult<MonitorInfo> {
        let id = self.id;
        self.toolkit.execute(move |tk| tk.monitor_info(id))
    }

    /// Human readable name
    pub fn name(&self) -> ToolkitResult<String> {
        self.info().map(|info| info.name)
    }

    /// Physical size in millimetres
    pub fn physical_size(&self) -> ToolkitResult<(i32, i32)> {
        self.info().map(|info| info.physical_size)
    }

    /// Position on the virtual desktop
    pub fn position(&self) -> ToolkitResult<(i32, i32)> {
        self.info().map(|info| info.position)
    }

    /// Mode currently in use
    pub fn current_mode(&self) -> ToolkitResult<Option<MonitorMode>> {
        self.info().map(|info| info.current_mode)
    }

    /// Every supported mode
    pub fn video_modes(&self) -> ToolkitResult<Vec<MonitorMode>> {
        self.info().map(|info| info.modes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::mock::{spawn, MockWorld, PRIMARY};
    use crate::toolkit::thread::test_lock;

    #[test]
    fn test_enumerates_monitors() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let thread = spawn(&world);
        let toolkit = thread.handle();

        let monitors = MonitorHandle::all(&toolkit);
        assert_eq!(monitors.len(), 2);

        let primary = MonitorHandle::primary(&toolkit).unwrap();
        assert_eq!(primary.id(), PRIMARY);
        assert_eq!(primary, monitors[0]);
        assert_ne!(primary, monitors[1]);
        assert_eq!(primary.name().unwrap(), "Mock Primary");
        assert_eq!(primary.current_mode().unwrap(), Some(MonitorMode::new(1920, 1080, 60)));
        assert_eq!(monitors[1].position().unwrap(), (1920, 0));
        assert_eq!(primary.video_modes().unwrap().len(), 2);
    }
}
