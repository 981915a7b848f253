//! In-process stand-in for the native toolkit, used by unit tests
//!
//! The simulated world lives behind an `Arc` so tests can inspect it from
//! their own thread while [`MockToolkit`] runs on the toolkit thread.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use ash::vk::{self, Handle};
use parking_lot::{Condvar, Mutex};

use super::{
    MonitorId, MonitorInfo, Toolkit, ToolkitError, ToolkitResult, ToolkitWaker, WindowDescriptor, WindowEvent,
    WindowKey, WindowVisibility,
};
use crate::window::input::{Key, KeyAction, MouseButton};
use crate::window::monitor::MonitorMode;

/// Simulated native window
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockWindow {
    pub title: String,
    pub size: (u32, u32),
    pub position: (i32, i32),
    pub opacity: f32,
    pub decorated: bool,
    pub resizable: bool,
    pub monitor: Option<(MonitorId, MonitorMode)>,
    pub visible: bool,
    pub iconified: bool,
    pub maximized: bool,
    pub should_close: bool,
    pub keys: HashMap<Key, KeyAction>,
    pub buttons: HashMap<MouseButton, KeyAction>,
    pub cursor: (f64, f64),
}

#[derive(Default)]
struct WorldState {
    windows: HashMap<WindowKey, MockWindow>,
    monitors: Vec<(MonitorId, MonitorInfo)>,
    calls: Vec<(&'static str, ThreadId)>,
    events: Vec<(WindowKey, WindowEvent)>,
    fail_next_window: bool,
    next_surface: u64,
}

/// Shared simulated toolkit state
pub(crate) struct MockWorld {
    state: Mutex<WorldState>,
    woken: Mutex<bool>,
    wake_signal: Condvar,
}

pub(crate) const PRIMARY: MonitorId = MonitorId(1);
pub(crate) const SECONDARY: MonitorId = MonitorId(2);

impl MockWorld {
    /// World with two monitors side by side
    pub fn new() -> Arc<Self> {
        let primary = MonitorInfo {
            name: "Mock Primary".to_string(),
            physical_size: (527, 296),
            position: (0, 0),
            current_mode: Some(MonitorMode::new(1920, 1080, 60)),
            modes: vec![MonitorMode::new(1280, 720, 60), MonitorMode::new(1920, 1080, 60)],
        };
        let secondary = MonitorInfo {
            name: "Mock Secondary".to_string(),
            physical_size: (597, 336),
            position: (1920, 0),
            current_mode: Some(MonitorMode::new(2560, 1440, 144)),
            modes: vec![MonitorMode::new(2560, 1440, 144)],
        };
        Arc::new(Self {
            state: Mutex::new(WorldState {
                monitors: vec![(PRIMARY, primary), (SECONDARY, secondary)],
                next_surface: 1,
                ..WorldState::default()
            }),
            woken: Mutex::new(false),
            wake_signal: Condvar::new(),
        })
    }

    /// Native calls made so far, with the thread each ran on
    pub fn calls(&self) -> Vec<(&'static str, ThreadId)> {
        self.state.lock().calls.clone()
    }

    /// Snapshot of a live window
    pub fn window(&self, key: WindowKey) -> Option<MockWindow> {
        self.state.lock().windows.get(&key).cloned()
    }

    /// Number of live windows
    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    /// Queue a native event for delivery on the next event pump
    pub fn inject_event(&self, key: WindowKey, event: WindowEvent) {
        self.state.lock().events.push((key, event));
    }

    /// Simulate a key transition
    pub fn set_key(&self, key: WindowKey, keyboard_key: Key, action: KeyAction) {
        if let Some(window) = self.state.lock().windows.get_mut(&key) {
            window.keys.insert(keyboard_key, action);
        }
    }

    /// Make the next window creation fail
    pub fn fail_next_window(&self) {
        self.state.lock().fail_next_window = true;
    }

    fn record(&self, call: &'static str) {
        self.state.lock().calls.push((call, thread::current().id()));
    }

    fn with_window<R>(&self, key: WindowKey, f: impl FnOnce(&mut MockWindow) -> R) -> R {
        let mut state = self.state.lock();
        let window = state
            .windows
            .get_mut(&key)
            .unwrap_or_else(|| panic!("window {} does not exist", key.raw()));
        f(window)
    }

    fn push_event(&self, key: WindowKey, event: WindowEvent) {
        self.state.lock().events.push((key, event));
    }
}

struct MockWaker(Arc<MockWorld>);

impl ToolkitWaker for MockWaker {
    fn wake(&self) {
        *self.0.woken.lock() = true;
        self.0.wake_signal.notify_all();
    }
}

/// [`Toolkit`] implementation backed by a [`MockWorld`]
pub(crate) struct MockToolkit {
    world: Arc<MockWorld>,
}

impl MockToolkit {
    pub fn new(world: Arc<MockWorld>) -> Self {
        Self { world }
    }
}

impl Toolkit for MockToolkit {
    fn waker(&self) -> Arc<dyn ToolkitWaker> {
        Arc::new(MockWaker(Arc::clone(&self.world)))
    }

    fn poll_events(&self) {
        self.world.record("poll_events");
    }

    fn wait_events(&self, timeout: Duration) {
        let mut woken = self.world.woken.lock();
        if !*woken {
            self.world.wake_signal.wait_for(&mut woken, timeout);
        }
        *woken = false;
    }

    fn take_events(&self) -> Vec<(WindowKey, WindowEvent)> {
        std::mem::take(&mut self.world.state.lock().events)
    }

    fn monitors(&self) -> Vec<MonitorId> {
        self.world.record("monitors");
        self.world.state.lock().monitors.iter().map(|(id, _)| *id).collect()
    }

    fn primary_monitor(&self) -> Option<MonitorId> {
        self.world.record("primary_monitor");
        self.world.state.lock().monitors.first().map(|(id, _)| *id)
    }

    fn monitor_info(&self, monitor: MonitorId) -> ToolkitResult<MonitorInfo> {
        self.world.record("monitor_info");
        self.world
            .state
            .lock()
            .monitors
            .iter()
            .find(|(id, _)| *id == monitor)
            .map(|(_, info)| info.clone())
            .ok_or(ToolkitError::UnknownMonitor(monitor))
    }

    fn create_window(&self, key: WindowKey, descriptor: &WindowDescriptor) -> ToolkitResult<()> {
        self.world.record("create_window");
        let mut state = self.world.state.lock();
        if std::mem::take(&mut state.fail_next_window) {
            return Err(ToolkitError::WindowCreation("simulated failure".to_string()));
        }

        let (size, position) = match descriptor.monitor {
            Some((id, mode)) => {
                let info = state
                    .monitors
                    .iter()
                    .find(|(candidate, _)| *candidate == id)
                    .map(|(_, info)| info)
                    .ok_or_else(|| ToolkitError::WindowCreation(format!("unknown monitor {:?}", id)))?;
                ((mode.width, mode.height), info.position)
            }
            None => (descriptor.size, (100, 100)),
        };

        state.windows.insert(key, MockWindow {
            title: descriptor.title.clone(),
            size,
            position,
            opacity: 1.0,
            decorated: descriptor.decorated,
            resizable: descriptor.resizable,
            monitor: descriptor.monitor,
            visible: true,
            iconified: false,
            maximized: false,
            should_close: false,
            keys: HashMap::new(),
            buttons: HashMap::new(),
            cursor: (0.0, 0.0),
        });
        Ok(())
    }

    fn destroy_window(&self, key: WindowKey) {
        self.world.record("destroy_window");
        self.world.state.lock().windows.remove(&key);
    }

    fn window_size(&self, key: WindowKey) -> (u32, u32) {
        self.world.record("window_size");
        self.world.with_window(key, |w| w.size)
    }

    fn set_window_size(&self, key: WindowKey, size: (u32, u32)) {
        self.world.record("set_window_size");
        self.world.with_window(key, |w| w.size = size);
        self.world.push_event(key, WindowEvent::Size(size.0, size.1));
        self.world.push_event(key, WindowEvent::Resolution(size.0, size.1));
    }

    fn window_position(&self, key: WindowKey) -> (i32, i32) {
        self.world.record("window_position");
        self.world.with_window(key, |w| w.position)
    }

    fn set_window_position(&self, key: WindowKey, position: (i32, i32)) {
        self.world.record("set_window_position");
        self.world.with_window(key, |w| w.position = position);
    }

    fn framebuffer_size(&self, key: WindowKey) -> (u32, u32) {
        self.world.record("framebuffer_size");
        self.world.with_window(key, |w| if w.iconified { (0, 0) } else { w.size })
    }

    fn content_scale(&self, key: WindowKey) -> (f32, f32) {
        self.world.record("content_scale");
        self.world.with_window(key, |_| (1.0, 1.0))
    }

    fn set_window_title(&self, key: WindowKey, title: &str) {
        self.world.record("set_window_title");
        self.world.with_window(key, |w| w.title = title.to_string());
    }

    fn window_opacity(&self, key: WindowKey) -> f32 {
        self.world.record("window_opacity");
        self.world.with_window(key, |w| w.opacity)
    }

    fn set_window_opacity(&self, key: WindowKey, opacity: f32) {
        self.world.record("set_window_opacity");
        self.world.with_window(key, |w| w.opacity = opacity);
    }

    fn is_decorated(&self, key: WindowKey) -> bool {
        self.world.record("is_decorated");
        self.world.with_window(key, |w| w.decorated)
    }

    fn set_decorated(&self, key: WindowKey, decorated: bool) {
        self.world.record("set_decorated");
        self.world.with_window(key, |w| w.decorated = decorated);
    }

    fn is_resizable(&self, key: WindowKey) -> bool {
        self.world.record("is_resizable");
        self.world.with_window(key, |w| w.resizable)
    }

    fn set_resizable(&self, key: WindowKey, resizable: bool) {
        self.world.record("set_resizable");
        self.world.with_window(key, |w| w.resizable = resizable);
    }

    fn set_window_monitor(
        &self,
        key: WindowKey,
        monitor: Option<(MonitorId, MonitorMode)>,
        position: (i32, i32),
        size: (u32, u32),
    ) {
        self.world.record("set_window_monitor");
        let monitor_position = monitor.and_then(|(id, _)| {
            self.world
                .state
                .lock()
                .monitors
                .iter()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, info)| info.position)
        });
        self.world.with_window(key, |w| {
            w.monitor = monitor;
            match (monitor, monitor_position) {
                (Some((_, mode)), Some(origin)) => {
                    w.position = origin;
                    w.size = (mode.width, mode.height);
                }
                _ => {
                    w.position = position;
                    w.size = size;
                }
            }
        });
    }

    fn set_visibility(&self, key: WindowKey, visibility: WindowVisibility) {
        self.world.record("set_visibility");
        self.world.with_window(key, |w| match visibility {
            WindowVisibility::Show => w.visible = true,
            WindowVisibility::Hide => w.visible = false,
            WindowVisibility::Iconify => w.iconified = true,
            WindowVisibility::Maximize => w.maximized = true,
            WindowVisibility::Restore => {
                w.iconified = false;
                w.maximized = false;
            }
        });
    }

    fn should_close(&self, key: WindowKey) -> bool {
        self.world.record("should_close");
        self.world.with_window(key, |w| w.should_close)
    }

    fn set_should_close(&self, key: WindowKey, should_close: bool) {
        self.world.record("set_should_close");
        self.world.with_window(key, |w| w.should_close = should_close);
    }

    fn key_state(&self, key: WindowKey, keyboard_key: Key) -> KeyAction {
        self.world.record("key_state");
        self.world.with_window(key, |w| w.keys.get(&keyboard_key).copied().unwrap_or_default())
    }

    fn mouse_button_state(&self, key: WindowKey, button: MouseButton) -> KeyAction {
        self.world.record("mouse_button_state");
        self.world.with_window(key, |w| w.buttons.get(&button).copied().unwrap_or_default())
    }

    fn cursor_position(&self, key: WindowKey) -> (f64, f64) {
        self.world.record("cursor_position");
        self.world.with_window(key, |w| w.cursor)
    }

    fn required_instance_extensions(&self) -> Vec<String> {
        self.world.record("required_instance_extensions");
        vec!["VK_KHR_surface".to_string()]
    }

    fn create_surface(&self, key: WindowKey, _instance: vk::Instance) -> ToolkitResult<vk::SurfaceKHR> {
        self.world.record("create_surface");
        let mut state = self.world.state.lock();
        if !state.windows.contains_key(&key) {
            return Err(ToolkitError::SurfaceCreation(format!("window {} does not exist", key.raw())));
        }
        let raw = state.next_surface;
        state.next_surface += 1;
        Ok(vk::SurfaceKHR::from_raw(raw))
    }
}

/// Factory creating a [`MockToolkit`] over `world` on the toolkit thread
pub(crate) fn factory(world: &Arc<MockWorld>) -> super::thread::ToolkitFactory {
    let world = Arc::clone(world);
    Box::new(move || Ok(Box::new(MockToolkit::new(world)) as Box<dyn Toolkit>))
}

/// Start a toolkit thread driving a [`MockToolkit`] over `world`
pub(crate) fn spawn(world: &Arc<MockWorld>) -> super::ToolkitThread {
    super::ToolkitThread::spawn(factory(world), super::EventQueue::new(), Duration::from_millis(20))
        .expect("mock toolkit thread")
}
