//! GLFW implementation of [`Toolkit`]
//!
//! Lives entirely on the toolkit thread. GLFW monitors have no stable
//! identity across enumerations, so each one is matched by name and desktop
//! position and given a [`MonitorId`] the first time it is seen.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ::glfw::{self as native, Context as _};
use ash::vk;

use super::{
    MonitorId, MonitorInfo, Toolkit, ToolkitError, ToolkitFactory, ToolkitResult, ToolkitWaker, WindowDescriptor,
    WindowEvent, WindowKey, WindowVisibility,
};
use crate::window::input::{Key, KeyAction, Modifiers, MouseButton};
use crate::window::MonitorMode;

struct NativeWindow {
    window: native::PWindow,
    events: native::GlfwReceiver<(f64, native::WindowEvent)>,
}

#[derive(Debug, Clone, PartialEq)]
struct MonitorIdentity {
    name: String,
    position: (i32, i32),
}

impl MonitorIdentity {
    fn of(monitor: &native::Monitor) -> Self {
        Self {
            name: monitor.get_name().unwrap_or_default(),
            position: monitor.get_pos(),
        }
    }

    fn matches(&self, monitor: &native::Monitor) -> bool {
        *self == Self::of(monitor)
    }
}

/// Interrupts `glfwWaitEventsTimeout` from any thread
struct GlfwWaker {
    alive: Arc<AtomicBool>,
}

impl ToolkitWaker for GlfwWaker {
    fn wake(&self) {
        if self.alive.load(Ordering::Acquire) {
            // glfwPostEmptyEvent may be called from any thread
            unsafe { native::ffi::glfwPostEmptyEvent() };
        }
    }
}

/// The GLFW library and every window it owns
pub struct GlfwToolkit {
    windows: RefCell<HashMap<WindowKey, NativeWindow>>,
    monitors: RefCell<Vec<(MonitorId, MonitorIdentity)>>,
    next_monitor: Cell<u64>,
    alive: Arc<AtomicBool>,
    glfw: RefCell<native::Glfw>,
}

impl GlfwToolkit {
    /// Initialize GLFW for Vulkan rendering
    pub fn new() -> ToolkitResult<Self> {
        let mut glfw = native::init(native::log_errors)
            .map_err(|e| ToolkitError::Initialization(format!("{:?}", e)))?;
        if !glfw.vulkan_supported() {
            return Err(ToolkitError::Initialization("GLFW reports no Vulkan loader".to_string()));
        }
        glfw.window_hint(native::WindowHint::ClientApi(native::ClientApiHint::NoApi));
        log::info!("GLFW {} initialized", native::get_version_string());

        Ok(Self {
            windows: RefCell::new(HashMap::new()),
            monitors: RefCell::new(Vec::new()),
            next_monitor: Cell::new(1),
            alive: Arc::new(AtomicBool::new(true)),
            glfw: RefCell::new(glfw),
        })
    }

    /// Factory for [`ToolkitThread::spawn`](super::ToolkitThread::spawn)
    pub fn factory() -> ToolkitFactory {
        Box::new(|| Ok(Box::new(Self::new()?) as Box<dyn Toolkit>))
    }

    fn with_window<R>(&self, key: WindowKey, f: impl FnOnce(&mut native::PWindow) -> R) -> R {
        let mut windows = self.windows.borrow_mut();
        let Some(native) = windows.get_mut(&key) else {
            panic!("window {} does not exist", key.raw());
        };
        f(&mut native.window)
    }

    fn identify(&self, identity: MonitorIdentity) -> MonitorId {
        let mut monitors = self.monitors.borrow_mut();
        if let Some((id, _)) = monitors.iter().find(|(_, known)| *known == identity) {
            return *id;
        }
        let id = MonitorId(self.next_monitor.get());
        self.next_monitor.set(id.0 + 1);
        log::debug!("Monitor '{}' at {:?} -> {:?}", identity.name, identity.position, id);
        monitors.push((id, identity));
        id
    }

    fn identity(&self, id: MonitorId) -> ToolkitResult<MonitorIdentity> {
        self.monitors
            .borrow()
            .iter()
            .find(|(known, _)| *known == id)
            .map(|(_, identity)| identity.clone())
            .ok_or(ToolkitError::UnknownMonitor(id))
    }

    fn convert_event(event: native::WindowEvent) -> Option<WindowEvent> {
        let to_u32 = |v: i32| u32::try_from(v).unwrap_or(0);
        Some(match event {
            native::WindowEvent::Pos(x, y) => WindowEvent::Position(x, y),
            native::WindowEvent::Size(w, h) => WindowEvent::Size(to_u32(w), to_u32(h)),
            native::WindowEvent::FramebufferSize(w, h) => WindowEvent::Resolution(to_u32(w), to_u32(h)),
            native::WindowEvent::ContentScale(x, y) => WindowEvent::Scale(x, y),
            native::WindowEvent::Close => WindowEvent::Close,
            native::WindowEvent::Refresh => WindowEvent::Refresh,
            native::WindowEvent::Focus(focused) => WindowEvent::Focus(focused),
            native::WindowEvent::Iconify(iconified) => WindowEvent::Iconify(iconified),
            native::WindowEvent::Maximize(maximized) => WindowEvent::Maximize(maximized),
            native::WindowEvent::Key(key, scancode, action, mods) => WindowEvent::Keyboard {
                key: Key(key as i32),
                scancode,
                action: KeyAction::from_raw(action as i32),
                modifiers: Modifiers::from_bits_truncate(mods.bits() as u32),
            },
            native::WindowEvent::Char(c) => WindowEvent::Character(c),
            native::WindowEvent::MouseButton(button, action, mods) => WindowEvent::MouseButton {
                button: MouseButton(button as i32 as u8),
                action: KeyAction::from_raw(action as i32),
                modifiers: Modifiers::from_bits_truncate(mods.bits() as u32),
            },
            native::WindowEvent::CursorPos(x, y) => WindowEvent::MousePosition(x, y),
            native::WindowEvent::CursorEnter(entered) => WindowEvent::CursorEnter(entered),
            native::WindowEvent::Scroll(x, y) => WindowEvent::Scroll(x, y),
            _ => return None,
        })
    }
}

impl Drop for GlfwToolkit {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        let count = self.windows.get_mut().len();
        if count > 0 {
            log::warn!("Destroying toolkit with {} windows still open", count);
        }
    }
}

fn monitor_mode(mode: native::VidMode) -> MonitorMode {
    MonitorMode {
        width: mode.width,
        height: mode.height,
        red_bits: mode.red_bits,
        green_bits: mode.green_bits,
        blue_bits: mode.blue_bits,
        refresh_rate: mode.refresh_rate,
    }
}

impl Toolkit for GlfwToolkit {
    fn waker(&self) -> Arc<dyn ToolkitWaker> {
        Arc::new(GlfwWaker {
            alive: Arc::clone(&self.alive),
        })
    }

    fn poll_events(&self) {
        self.glfw.borrow_mut().poll_events();
    }

    fn wait_events(&self, timeout: Duration) {
        self.glfw.borrow_mut().wait_events_timeout(timeout.as_secs_f64());
    }

    fn take_events(&self) -> Vec<(WindowKey, WindowEvent)> {
        let windows = self.windows.borrow();
        let mut events = Vec::new();
        for (&key, native) in windows.iter() {
            events.extend(
                native::flush_messages(&native.events)
                    .filter_map(|(_, event)| Self::convert_event(event))
                    .map(|event| (key, event)),
            );
        }
        events
    }

    fn monitors(&self) -> Vec<MonitorId> {
        let identities: Vec<MonitorIdentity> = self
            .glfw
            .borrow_mut()
            .with_connected_monitors(|_, monitors| monitors.iter().map(|m| MonitorIdentity::of(m)).collect());
        identities.into_iter().map(|identity| self.identify(identity)).collect()
    }

    fn primary_monitor(&self) -> Option<MonitorId> {
        let identity = self
            .glfw
            .borrow_mut()
            .with_primary_monitor(|_, monitor| monitor.map(|m| MonitorIdentity::of(m)));
        identity.map(|identity| self.identify(identity))
    }

    fn monitor_info(&self, monitor: MonitorId) -> ToolkitResult<MonitorInfo> {
        let identity = self.identity(monitor)?;
        self.glfw
            .borrow_mut()
            .with_connected_monitors(|_, monitors| {
                monitors.iter().find(|m| identity.matches(m)).map(|m| MonitorInfo {
                    name: identity.name.clone(),
                    physical_size: m.get_physical_size(),
                    position: identity.position,
                    current_mode: m.get_video_mode().map(monitor_mode),
                    modes: m.get_video_modes().into_iter().map(monitor_mode).collect(),
                })
            })
            .ok_or(ToolkitError::UnknownMonitor(monitor))
    }

    fn create_window(&self, key: WindowKey, descriptor: &WindowDescriptor) -> ToolkitResult<()> {
        let target = descriptor
            .monitor
            .map(|(id, mode)| self.identity(id).map(|identity| (identity, mode)))
            .transpose()?;

        let created = {
            let mut glfw = self.glfw.borrow_mut();
            glfw.window_hint(native::WindowHint::Resizable(descriptor.resizable));
            glfw.window_hint(native::WindowHint::Decorated(descriptor.decorated));
            match &target {
                None => glfw.create_window(
                    descriptor.size.0,
                    descriptor.size.1,
                    &descriptor.title,
                    native::WindowMode::Windowed,
                ),
                Some((identity, mode)) => {
                    glfw.window_hint(native::WindowHint::RefreshRate(Some(mode.refresh_rate)));
                    let created = glfw.with_connected_monitors(|glfw, monitors| {
                        let monitor = monitors.iter().find(|m| identity.matches(m))?;
                        glfw.create_window(mode.width, mode.height, &descriptor.title, native::WindowMode::FullScreen(monitor))
                    });
                    glfw.window_hint(native::WindowHint::RefreshRate(None));
                    created
                }
            }
        };

        let (mut window, events) = created.ok_or_else(|| {
            ToolkitError::WindowCreation(format!("GLFW could not create '{}'", descriptor.title))
        })?;
        window.set_all_polling(true);
        log::debug!("Native window {} created", key.raw());
        self.windows.borrow_mut().insert(key, NativeWindow { window, events });
        Ok(())
    }

    fn destroy_window(&self, key: WindowKey) {
        // Dropping the PWindow destroys the native window
        if self.windows.borrow_mut().remove(&key).is_none() {
            panic!("window {} does not exist", key.raw());
        }
        log::debug!("Native window {} destroyed", key.raw());
    }

    fn window_size(&self, key: WindowKey) -> (u32, u32) {
        self.with_window(key, |w| {
            let (width, height) = w.get_size();
            (width.max(0) as u32, height.max(0) as u32)
        })
    }

    fn set_window_size(&self, key: WindowKey, size: (u32, u32)) {
        self.with_window(key, |w| w.set_size(size.0 as i32, size.1 as i32));
    }

    fn window_position(&self, key: WindowKey) -> (i32, i32) {
        self.with_window(key, |w| w.get_pos())
    }

    fn set_window_position(&self, key: WindowKey, position: (i32, i32)) {
        self.with_window(key, |w| w.set_pos(position.0, position.1));
    }

    fn framebuffer_size(&self, key: WindowKey) -> (u32, u32) {
        self.with_window(key, |w| {
            let (width, height) = w.get_framebuffer_size();
            (width.max(0) as u32, height.max(0) as u32)
        })
    }

    fn content_scale(&self, key: WindowKey) -> (f32, f32) {
        self.with_window(key, |w| w.get_content_scale())
    }

    fn set_window_title(&self, key: WindowKey, title: &str) {
        self.with_window(key, |w| w.set_title(title));
    }

    fn window_opacity(&self, key: WindowKey) -> f32 {
        self.with_window(key, |w| w.get_opacity())
    }

    fn set_window_opacity(&self, key: WindowKey, opacity: f32) {
        self.with_window(key, |w| w.set_opacity(opacity));
    }

    fn is_decorated(&self, key: WindowKey) -> bool {
        self.with_window(key, |w| w.is_decorated())
    }

    fn set_decorated(&self, key: WindowKey, decorated: bool) {
        self.with_window(key, |w| w.set_decorated(decorated));
    }

    fn is_resizable(&self, key: WindowKey) -> bool {
        self.with_window(key, |w| w.is_resizable())
    }

    fn set_resizable(&self, key: WindowKey, resizable: bool) {
        self.with_window(key, |w| w.set_resizable(resizable));
    }

    fn set_window_monitor(
        &self,
        key: WindowKey,
        monitor: Option<(MonitorId, MonitorMode)>,
        position: (i32, i32),
        size: (u32, u32),
    ) {
        let Some((id, mode)) = monitor else {
            self.with_window(key, |w| {
                w.set_monitor(native::WindowMode::Windowed, position.0, position.1, size.0, size.1, None);
            });
            return;
        };

        let identity = match self.identity(id) {
            Ok(identity) => identity,
            Err(e) => {
                log::warn!("Fullscreen request ignored: {}", e);
                return;
            }
        };
        let mut windows = self.windows.borrow_mut();
        let Some(native) = windows.get_mut(&key) else {
            panic!("window {} does not exist", key.raw());
        };
        let found = self.glfw.borrow_mut().with_connected_monitors(|_, monitors| {
            let Some(monitor) = monitors.iter().find(|m| identity.matches(m)) else {
                return false;
            };
            let (x, y) = monitor.get_pos();
            native.window.set_monitor(
                native::WindowMode::FullScreen(monitor),
                x,
                y,
                mode.width,
                mode.height,
                Some(mode.refresh_rate),
            );
            true
        });
        if !found {
            log::warn!("Monitor {:?} disconnected before going fullscreen", id);
        }
    }

    fn set_visibility(&self, key: WindowKey, visibility: WindowVisibility) {
        self.with_window(key, |w| match visibility {
            WindowVisibility::Show => w.show(),
            WindowVisibility::Hide => w.hide(),
            WindowVisibility::Iconify => w.iconify(),
            WindowVisibility::Maximize => w.maximize(),
            WindowVisibility::Restore => w.restore(),
        });
    }

    fn should_close(&self, key: WindowKey) -> bool {
        self.with_window(key, |w| w.should_close())
    }

    fn set_should_close(&self, key: WindowKey, should_close: bool) {
        self.with_window(key, |w| w.set_should_close(should_close));
    }

    fn key_state(&self, key: WindowKey, keyboard_key: Key) -> KeyAction {
        self.with_window(key, |w| {
            let raw = unsafe { native::ffi::glfwGetKey(w.window_ptr(), keyboard_key.0) };
            KeyAction::from_raw(raw)
        })
    }

    fn mouse_button_state(&self, key: WindowKey, button: MouseButton) -> KeyAction {
        self.with_window(key, |w| {
            let raw = unsafe { native::ffi::glfwGetMouseButton(w.window_ptr(), i32::from(button.0)) };
            KeyAction::from_raw(raw)
        })
    }

    fn cursor_position(&self, key: WindowKey) -> (f64, f64) {
        self.with_window(key, |w| w.get_cursor_pos())
    }

    fn required_instance_extensions(&self) -> Vec<String> {
        self.glfw
            .borrow()
            .get_required_instance_extensions()
            .unwrap_or_default()
    }

    fn create_surface(&self, key: WindowKey, instance: vk::Instance) -> ToolkitResult<vk::SurfaceKHR> {
        self.with_window(key, |w| {
            let mut surface = vk::SurfaceKHR::null();
            let result = w.create_window_surface(instance, std::ptr::null(), &mut surface);
            if result == vk::Result::SUCCESS {
                Ok(surface)
            } else {
                Err(ToolkitError::SurfaceCreation(format!("{:?}", result)))
            }
        })
    }
}
