//! Native window handle
//!
//! A [`WindowHandle`] owns exactly one native window. Every accessor is a
//! synchronous round-trip through the toolkit thread. Dropping the handle
//! unregisters its event route, purges its queued events and destroys the
//! native window, in that order and in a single toolkit request.

use ash::vk;

use super::callbacks::SharedCallbacks;
use super::input::{Key, KeyAction, MouseButton};
use super::monitor::{MonitorHandle, MonitorMode};
use super::state::WindowState;
use crate::toolkit::{
    MonitorId, ToolkitHandle, ToolkitResult, ToolkitState, WindowDescriptor, WindowKey, WindowVisibility,
};

/// Position and size to return to when leaving fullscreen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowedGeometry {
    /// Window position
    pub position: (i32, i32),
    /// Client area size
    pub size: (u32, u32),
}

/// RAII owner of one native window
pub struct WindowHandle {
    key: WindowKey,
    toolkit: ToolkitHandle,
    callbacks: SharedCallbacks,
    monitor: Option<(MonitorId, MonitorMode)>,
    windowed: WindowedGeometry,
    state: WindowState,
}

impl WindowHandle {
    /// Create a native window
    ///
    /// Events of the new window are queued for `callbacks` from the moment it
    /// exists. Fails if the toolkit refuses the window, e.g. for a monitor
    /// and mode combination it cannot honour.
    pub fn create(
        toolkit: &ToolkitHandle,
        descriptor: WindowDescriptor,
        callbacks: SharedCallbacks,
    ) -> ToolkitResult<Self> {
        let key = WindowKey::next();
        let route = SharedCallbacks::clone(&callbacks);
        let monitor = descriptor.monitor;

        let windowed = toolkit.execute_with_host(move |host| {
            let tk = host.toolkit();
            tk.create_window(key, &descriptor)?;
            host.register_route(key, route);
            let geometry = if descriptor.monitor.is_some() {
                WindowedGeometry { position: (0, 0), size: descriptor.size }
            } else {
                WindowedGeometry {
                    position: tk.window_position(key),
                    size: tk.window_size(key),
                }
            };
            Ok::<_, crate::toolkit::ToolkitError>(geometry)
        })?;

        log::debug!("Created window {} ({}x{})", key.raw(), windowed.size.0, windowed.size.1);
        Ok(Self {
            key,
            toolkit: toolkit.clone(),
            callbacks,
            monitor,
            windowed,
            state: if monitor.is_some() { WindowState::Fullscreen } else { WindowState::Normal },
        })
    }

    /// Identity used to route this window's events
    pub fn key(&self) -> WindowKey {
        self.key
    }

    /// Toolkit the window lives on
    pub fn toolkit(&self) -> &ToolkitHandle {
        &self.toolkit
    }

    /// Callback table events are dispatched to
    pub fn callbacks(&self) -> &SharedCallbacks {
        &self.callbacks
    }

    fn run<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&dyn crate::toolkit::Toolkit, WindowKey) -> R + Send + 'static,
        R: Send + 'static,
    {
        let key = self.key;
        self.toolkit.execute(move |tk| f(tk, key))
    }

    /// Client area size
    pub fn get_size(&self) -> (u32, u32) {
        self.run(|tk, key| tk.window_size(key))
    }

    /// Resize the client area
    ///
    /// The window manager may clamp the result; read it back with
    /// [`get_size`](Self::get_size).
    pub fn set_size(&mut self, size: (u32, u32)) {
        self.run(move |tk, key| tk.set_window_size(key, size));
        if self.monitor.is_none() {
            self.windowed.size = size;
        }
    }

    /// Position on the virtual desktop
    pub fn get_position(&self) -> (i32, i32) {
        self.run(|tk, key| tk.window_position(key))
    }

    /// Move the window
    pub fn set_position(&mut self, position: (i32, i32)) {
        self.run(move |tk, key| tk.set_window_position(key, position));
        if self.monitor.is_none() {
            self.windowed.position = position;
        }
    }

    /// Framebuffer size in pixels
    pub fn get_framebuffer_size(&self) -> (u32, u32) {
        self.run(|tk, key| tk.framebuffer_size(key))
    }

    /// Content scale
    pub fn get_content_scale(&self) -> (f32, f32) {
        self.run(|tk, key| tk.content_scale(key))
    }

    /// Set the title bar text
    pub fn set_title(&mut self, title: &str) {
        let title = title.to_string();
        self.run(move |tk, key| tk.set_window_title(key, &title));
    }

    /// Whole-window opacity
    pub fn get_opacity(&self) -> f32 {
        self.run(|tk, key| tk.window_opacity(key))
    }

    /// Set whole-window opacity
    pub fn set_opacity(&mut self, opacity: f32) {
        self.run(move |tk, key| tk.set_window_opacity(key, opacity));
    }

    /// Whether the window has decorations
    pub fn is_decorated(&self) -> bool {
        self.run(|tk, key| tk.is_decorated(key))
    }

    /// Toggle decorations
    pub fn set_decorated(&mut self, decorated: bool) {
        self.run(move |tk, key| tk.set_decorated(key, decorated));
    }

    /// Whether the user may resize the window
    pub fn is_resizable(&self) -> bool {
        self.run(|tk, key| tk.is_resizable(key))
    }

    /// Toggle user resizing
    pub fn set_resizable(&mut self, resizable: bool) {
        self.run(move |tk, key| tk.set_resizable(key, resizable));
    }

    /// Check if the window should close
    pub fn should_close(&self) -> bool {
        self.run(|tk, key| tk.should_close(key))
    }

    /// Set whether the window should close
    pub fn set_should_close(&mut self, should_close: bool) {
        self.run(move |tk, key| tk.set_should_close(key, should_close));
    }

    /// Last known state of a keyboard key
    pub fn get_key_state(&self, keyboard_key: Key) -> KeyAction {
        self.run(move |tk, key| tk.key_state(key, keyboard_key))
    }

    /// Last known state of a mouse button
    pub fn get_mouse_button_state(&self, button: MouseButton) -> KeyAction {
        self.run(move |tk, key| tk.mouse_button_state(key, button))
    }

    /// Cursor position relative to the client area
    pub fn get_mouse_position(&self) -> (f64, f64) {
        self.run(|tk, key| tk.cursor_position(key))
    }

    /// Fullscreen monitor and mode, if fullscreen
    pub fn get_monitor(&self) -> Option<(MonitorId, MonitorMode)> {
        self.monitor
    }

    /// Whether the window is fullscreen on some monitor
    pub fn is_fullscreen(&self) -> bool {
        self.monitor.is_some()
    }

    /// Geometry restored when leaving fullscreen
    pub fn windowed_geometry(&self) -> WindowedGeometry {
        self.windowed
    }

    /// Position restored when a fullscreen window returns to windowed mode
    ///
    /// Has no visible effect until then; a windowed window is moved directly
    /// with [`WindowHandle::set_position`].
    pub(crate) fn set_windowed_position(&mut self, position: (i32, i32)) {
        self.windowed.position = position;
    }

    /// Go fullscreen on `monitor` with `mode`, or back to windowed with `None`
    ///
    /// Entering fullscreen from windowed mode remembers the current position
    /// and size; returning to windowed mode restores them. Requesting the
    /// current monitor and mode again does nothing.
    pub fn set_monitor(&mut self, monitor: Option<(&MonitorHandle, MonitorMode)>) {
        self.set_monitor_id(monitor.map(|(handle, mode)| (handle.id(), mode)));
    }

    pub(crate) fn set_monitor_id(&mut self, target: Option<(MonitorId, MonitorMode)>) {
        if target == self.monitor {
            return;
        }

        if self.monitor.is_none() {
            self.windowed = WindowedGeometry {
                position: self.get_position(),
                size: self.get_size(),
            };
        }

        let WindowedGeometry { position, size } = self.windowed;
        self.run(move |tk, key| tk.set_window_monitor(key, target, position, size));
        self.monitor = target;
        if target.is_some() {
            self.state = WindowState::Fullscreen;
        } else if self.state == WindowState::Fullscreen {
            self.state = WindowState::Normal;
        }
        log::debug!("Window {} monitor -> {:?}", self.key.raw(), target);
    }

    /// Current coarse state
    pub fn get_state(&self) -> WindowState {
        self.state
    }

    /// Move to another coarse state
    ///
    /// The effects of the current state are undone before the new state is
    /// applied. [`WindowState::Fullscreen`] uses the primary monitor at its
    /// current mode and falls back to [`WindowState::Normal`] when there is
    /// none.
    pub fn set_state(&mut self, state: WindowState) {
        if state == self.state {
            return;
        }

        match self.state {
            WindowState::Normal => {}
            WindowState::Hidden => self.set_visibility(WindowVisibility::Show),
            WindowState::Fullscreen => self.set_monitor_id(None),
            WindowState::Iconified | WindowState::Maximized => self.set_visibility(WindowVisibility::Restore),
        }

        self.state = match state {
            WindowState::Normal => WindowState::Normal,
            WindowState::Hidden => {
                self.set_visibility(WindowVisibility::Hide);
                WindowState::Hidden
            }
            WindowState::Fullscreen => match self.primary_fullscreen_target() {
                Some(target) => {
                    self.set_monitor_id(Some(target));
                    WindowState::Fullscreen
                }
                None => {
                    log::warn!("No monitor available for fullscreen");
                    WindowState::Normal
                }
            },
            WindowState::Iconified => {
                self.set_visibility(WindowVisibility::Iconify);
                WindowState::Iconified
            }
            WindowState::Maximized => {
                self.set_visibility(WindowVisibility::Maximize);
                WindowState::Maximized
            }
        };
    }

    fn set_visibility(&mut self, visibility: WindowVisibility) {
        self.run(move |tk, key| tk.set_visibility(key, visibility));
    }

    fn primary_fullscreen_target(&self) -> Option<(MonitorId, MonitorMode)> {
        self.toolkit.execute(|tk| {
            let id = tk.primary_monitor()?;
            let mode = tk.monitor_info(id).ok()?.current_mode?;
            Some((id, mode))
        })
    }

    /// Create a Vulkan surface for this window
    pub fn create_surface(&self, instance: vk::Instance) -> ToolkitResult<vk::SurfaceKHR> {
        self.run(move |tk, key| tk.create_surface(key, instance))
    }
}

impl Drop for WindowHandle {
    fn drop(&mut self) {
        if self.toolkit.state() != ToolkitState::Running {
            log::error!("Window {} outlived the toolkit thread; native window leaked", self.key.raw());
            return;
        }
        let key = self.key;
        self.toolkit.execute_with_host(move |host| {
            host.unregister_route(key);
            host.toolkit().destroy_window(key);
        });
        log::debug!("Destroyed window {}", key.raw());
    }
}

impl std::fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowHandle")
            .field("key", &self.key)
            .field("monitor", &self.monitor)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::mock::{spawn, MockWorld, PRIMARY, SECONDARY};
    use crate::toolkit::thread::test_lock;
    use crate::toolkit::{ToolkitError, WindowEvent};
    use crate::window::callbacks::WindowCallbacks;

    fn descriptor(size: (u32, u32)) -> WindowDescriptor {
        WindowDescriptor {
            size,
            title: "test".to_string(),
            monitor: None,
            resizable: true,
            decorated: true,
        }
    }

    #[test]
    fn test_fullscreen_round_trip_restores_geometry() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let thread = spawn(&world);
        let toolkit = thread.handle();

        let mut window = WindowHandle::create(&toolkit, descriptor((640, 480)), WindowCallbacks::shared()).unwrap();
        window.set_position((200, 150));
        window.set_size((800, 600));

        let monitors = MonitorHandle::all(&toolkit);
        let secondary = monitors.iter().find(|m| m.id() == SECONDARY).unwrap();
        let mode = MonitorMode::new(2560, 1440, 144);
        window.set_monitor(Some((secondary, mode)));
        assert!(window.is_fullscreen());
        assert_eq!(window.get_size(), (2560, 1440));
        assert_eq!(window.get_position(), (1920, 0));

        window.set_monitor(None);
        assert!(!window.is_fullscreen());
        assert_eq!(window.get_position(), (200, 150));
        assert_eq!(window.get_size(), (800, 600));
    }

    #[test]
    fn test_same_monitor_is_noop() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let thread = spawn(&world);
        let toolkit = thread.handle();

        let mut window = WindowHandle::create(&toolkit, descriptor((640, 480)), WindowCallbacks::shared()).unwrap();
        let primary = MonitorHandle::primary(&toolkit).unwrap();
        let mode = MonitorMode::new(1920, 1080, 60);
        window.set_monitor(Some((&primary, mode)));

        let before = world.calls().iter().filter(|(call, _)| *call == "set_window_monitor").count();
        window.set_monitor(Some((&primary, mode)));
        window.set_monitor_id(Some((PRIMARY, mode)));
        let after = world.calls().iter().filter(|(call, _)| *call == "set_window_monitor").count();
        assert_eq!(before, after);
    }

    #[test]
    fn test_state_transitions_undo_previous_state() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let thread = spawn(&world);
        let toolkit = thread.handle();

        let mut window = WindowHandle::create(&toolkit, descriptor((640, 480)), WindowCallbacks::shared()).unwrap();
        let key = window.key();
        let original_position = window.get_position();

        window.set_state(WindowState::Hidden);
        assert!(!world.window(key).unwrap().visible);

        window.set_state(WindowState::Fullscreen);
        let native = world.window(key).unwrap();
        assert!(native.visible);
        assert_eq!(native.monitor.map(|(id, _)| id), Some(PRIMARY));
        assert_eq!(native.size, (1920, 1080));

        window.set_state(WindowState::Maximized);
        let native = world.window(key).unwrap();
        assert!(native.monitor.is_none());
        assert!(native.maximized);
        assert_eq!(native.position, original_position);
        assert_eq!(native.size, (640, 480));

        let calls = world.calls().len();
        window.set_state(WindowState::Maximized);
        assert_eq!(world.calls().len(), calls);

        window.set_state(WindowState::Normal);
        assert!(!world.window(key).unwrap().maximized);
        assert_eq!(window.get_state(), WindowState::Normal);
    }

    #[test]
    fn test_creation_failure_is_reported() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let thread = spawn(&world);
        world.fail_next_window();

        let result = WindowHandle::create(&thread.handle(), descriptor((640, 480)), WindowCallbacks::shared());
        assert!(matches!(result, Err(ToolkitError::WindowCreation(_))));
        assert_eq!(world.window_count(), 0);
    }

    #[test]
    fn test_input_queries_and_affinity() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let thread = spawn(&world);
        let toolkit = thread.handle();

        let window = WindowHandle::create(&toolkit, descriptor((640, 480)), WindowCallbacks::shared()).unwrap();
        world.set_key(window.key(), Key::SPACE, KeyAction::Press);
        assert_eq!(window.get_key_state(Key::SPACE), KeyAction::Press);
        assert_eq!(window.get_key_state(Key::ESCAPE), KeyAction::Release);
        assert_eq!(window.get_mouse_button_state(MouseButton::LEFT), KeyAction::Release);
        assert_eq!(window.get_mouse_position(), (0.0, 0.0));

        let toolkit_thread = toolkit.thread_id().unwrap();
        assert!(world.calls().iter().all(|(_, id)| *id == toolkit_thread));
    }

    #[test]
    fn test_drop_purges_events_and_destroys_window() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let thread = spawn(&world);
        let toolkit = thread.handle();

        let window = WindowHandle::create(&toolkit, descriptor((640, 480)), WindowCallbacks::shared()).unwrap();
        let key = window.key();
        world.inject_event(key, WindowEvent::Close);
        toolkit.poll_events();
        assert_eq!(toolkit.events().len(), 1);

        drop(window);
        assert!(toolkit.events().is_empty());
        assert!(world.window(key).is_none());
    }
}
