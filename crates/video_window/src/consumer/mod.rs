//! # Window Consumers
//!
//! A [`WindowConsumer`] is the public face of a video window. It keeps the
//! desired window attributes, callbacks and rendering settings for its whole
//! life and owns a [`PresentationSurface`] only while open.
//!
//! Two flavours share one implementation:
//! - [`WindowConsumer::scaler`] pulls frames from a [`FrameSource`] and draws
//!   them with the fixed scaling pipeline.
//! - [`WindowConsumer::renderer`] lets external [`Layer`]s record into the
//!   render pass.
//!
//! Lifecycle: `Closed -> open() -> Open (no mode) -> set_video_mode() ->
//! Open (periodic updates) -> close() -> Closed`.

pub mod camera;
pub mod capabilities;

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use parking_lot::MutexGuard;

use crate::config::{PresentSettings, WindowSettings};
use crate::instance::InstanceLock;
use crate::present::vulkan::VulkanFactory;
use crate::present::{BackendFactory, PresentResult, PresentationSurface, ReconfigureParams, ScalingFilter, ScalingMode, SurfaceVariant};
use crate::scheduler::UpdateId;
use crate::toolkit::{MonitorId, WindowDescriptor};
use crate::video::format;
use crate::video::{Frame, FrameSource, Layer, Resolution, VideoMode, VideoModeCompatibility};
use crate::window::{MonitorHandle, MonitorMode, SharedCallbacks, WindowCallbacks, WindowHandle, WindowState};

pub use camera::{Camera, Projection};
pub use capabilities::{Lifecycle, PeriodicUpdate, RendererTarget, VideoConsumer};

/// Update period used when the negotiated rate leaves it open
const FALLBACK_PERIOD: Duration = Duration::from_micros(16_667);

/// A window showing video, configurable whether open or closed
pub struct WindowConsumer<F: BackendFactory = VulkanFactory> {
    surface: Option<PresentationSurface<F::Backend>>,
    factory: F,
    id: UpdateId,
    variant: SurfaceVariant,
    window: WindowSettings,
    present: PresentSettings,
    monitor: Option<(MonitorId, MonitorMode)>,
    state: WindowState,
    callbacks: SharedCallbacks,
    video_mode: Option<VideoMode>,
    depth_stencil_format: vk::Format,
    camera: Camera,
    compatibility: Vec<VideoModeCompatibility>,
    compatibility_changed: bool,
    source: Option<Box<dyn FrameSource>>,
    last_frame: Option<Arc<dyn Frame>>,
    layers: Vec<Arc<dyn Layer>>,
    has_changed: bool,
}

impl<F: BackendFactory> WindowConsumer<F> {
    /// Consumer drawing frames with the scaling pipeline
    pub fn scaler(factory: F, window: WindowSettings, present: PresentSettings) -> Self {
        Self::with_variant(factory, SurfaceVariant::Scaler, window, present)
    }

    /// Consumer drawing external layers
    pub fn renderer(factory: F, window: WindowSettings, present: PresentSettings) -> Self {
        Self::with_variant(factory, SurfaceVariant::Layers, window, present)
    }

    fn with_variant(factory: F, variant: SurfaceVariant, window: WindowSettings, present: PresentSettings) -> Self {
        Self {
            surface: None,
            factory,
            id: UpdateId::next(),
            variant,
            window,
            present,
            monitor: None,
            state: WindowState::Normal,
            callbacks: WindowCallbacks::shared(),
            video_mode: None,
            depth_stencil_format: vk::Format::UNDEFINED,
            camera: Camera::default(),
            compatibility: Vec::new(),
            compatibility_changed: false,
            source: None,
            last_frame: None,
            layers: Vec::new(),
            has_changed: false,
        }
    }

    /// Which flavour this consumer is
    pub fn variant(&self) -> SurfaceVariant {
        self.variant
    }

    /// Live surface, while open
    pub fn surface(&self) -> Option<&PresentationSurface<F::Backend>> {
        self.surface.as_ref()
    }

    /// Live window, while open
    pub fn window(&self) -> Option<&WindowHandle> {
        self.surface.as_ref().map(PresentationSurface::window)
    }

    fn window_mut(&mut self) -> Option<&mut WindowHandle> {
        self.surface.as_mut().map(PresentationSurface::window_mut)
    }

    /// Callback table; edits apply to the current and every future window
    pub fn callbacks(&self) -> MutexGuard<'_, WindowCallbacks> {
        self.callbacks.lock()
    }

    /// Title bar text
    pub fn title(&self) -> &str {
        &self.window.title
    }

    /// Set the title bar text
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.window.title = title.into();
        let title = self.window.title.clone();
        if let Some(window) = self.window_mut() {
            window.set_title(&title);
        }
    }

    /// Client area size: the live size while open, the desired one otherwise
    pub fn size(&self) -> (u32, u32) {
        self.window().map_or(self.window.size, WindowHandle::get_size)
    }

    /// Resize the window
    ///
    /// While open the presentable modes are recomputed, since the window
    /// manager may not grant exactly `size`.
    pub fn set_size(&mut self, size: (u32, u32)) -> PresentResult<()> {
        self.window.size = size;
        if let Some(window) = self.window_mut() {
            window.set_size(size);
        }
        self.refresh_compatibility()
    }

    /// Window position
    pub fn position(&self) -> Option<(i32, i32)> {
        self.window().map(WindowHandle::get_position).or(self.window.position)
    }

    /// Move the window
    pub fn set_position(&mut self, position: (i32, i32)) {
        self.window.position = Some(position);
        if let Some(window) = self.window_mut() {
            window.set_position(position);
        }
    }

    /// Whole-window opacity
    pub fn opacity(&self) -> f32 {
        self.window().map_or(self.window.opacity, WindowHandle::get_opacity)
    }

    /// Set whole-window opacity
    pub fn set_opacity(&mut self, opacity: f32) {
        self.window.opacity = opacity;
        if let Some(window) = self.window_mut() {
            window.set_opacity(opacity);
        }
    }

    /// Whether the window has decorations
    pub fn is_decorated(&self) -> bool {
        self.window().map_or(self.window.decorated, WindowHandle::is_decorated)
    }

    /// Toggle decorations
    pub fn set_decorated(&mut self, decorated: bool) {
        self.window.decorated = decorated;
        if let Some(window) = self.window_mut() {
            window.set_decorated(decorated);
        }
    }

    /// Whether the user may resize the window
    pub fn is_resizable(&self) -> bool {
        self.window().map_or(self.window.resizable, WindowHandle::is_resizable)
    }

    /// Toggle user resizing
    pub fn set_resizable(&mut self, resizable: bool) {
        self.window.resizable = resizable;
        if let Some(window) = self.window_mut() {
            window.set_resizable(resizable);
        }
    }

    /// Fullscreen monitor and mode
    pub fn monitor(&self) -> Option<(MonitorId, MonitorMode)> {
        self.monitor
    }

    /// Go fullscreen on a monitor, or windowed with `None`
    pub fn set_monitor(&mut self, monitor: Option<(&MonitorHandle, MonitorMode)>) -> PresentResult<()> {
        self.monitor = monitor.map(|(handle, mode)| (handle.id(), mode));
        if self.monitor.is_some() {
            self.state = WindowState::Fullscreen;
        } else if self.state == WindowState::Fullscreen {
            self.state = WindowState::Normal;
        }

        let target = self.monitor;
        if let Some(window) = self.window_mut() {
            window.set_monitor_id(target);
        }
        self.refresh_compatibility()
    }

    /// Coarse window state
    pub fn window_state(&self) -> WindowState {
        self.state
    }

    /// Change the coarse window state
    pub fn set_window_state(&mut self, state: WindowState) -> PresentResult<()> {
        self.state = state;
        if state != WindowState::Fullscreen {
            self.monitor = None;
        }

        let Some(window) = self.window_mut() else {
            return Ok(());
        };
        window.set_state(state);
        let (monitor, actual) = (window.get_monitor(), window.get_state());
        self.monitor = monitor;
        self.state = actual;
        self.refresh_compatibility()
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window().is_some_and(WindowHandle::should_close)
    }

    /// Set or clear the close request
    pub fn set_should_close(&mut self, should_close: bool) {
        if let Some(window) = self.window_mut() {
            window.set_should_close(should_close);
        }
    }

    /// How frames are fitted into the window
    pub fn scaling_mode(&self) -> ScalingMode {
        self.present.scaling_mode
    }

    /// Change how frames are fitted into the window
    pub fn set_scaling_mode(&mut self, mode: ScalingMode) {
        self.present.scaling_mode = mode;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_scaling_mode(mode);
        }
        self.has_changed = true;
    }

    /// Sampling filter
    pub fn scaling_filter(&self) -> ScalingFilter {
        self.present.scaling_filter
    }

    /// Change the sampling filter
    pub fn set_scaling_filter(&mut self, filter: ScalingFilter) {
        self.present.scaling_filter = filter;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_scaling_filter(filter);
        }
        self.has_changed = true;
    }

    /// Change the background colour
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.present.clear_color = color;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_clear_color(color);
        }
        self.has_changed = true;
    }

    /// Change the ordering of this consumer's update within a tick
    pub fn set_update_priority(&mut self, lock: &mut InstanceLock<'_>, priority: i32) {
        self.present.update_priority = priority;
        if let Some(period) = lock.scheduler.period(self.id) {
            lock.scheduler.enable_periodic_update(self.id, priority, period);
        }
    }

    /// Set the frame source for the scaler
    pub fn set_source(&mut self, source: Option<Box<dyn FrameSource>>) {
        self.source = source;
        self.last_frame = None;
        self.has_changed = true;
    }

    /// Set the layers drawn by the renderer
    pub fn set_layers(&mut self, layers: Vec<Arc<dyn Layer>>) {
        self.layers = layers;
        self.has_changed = true;
    }

    /// React to window events dispatched since the last call
    ///
    /// A framebuffer resize recomputes the presentable modes; a damage
    /// notification forces a redraw. Called by [`PeriodicUpdate::update`];
    /// call it directly after dispatching events while no mode is set.
    pub fn handle_window_events(&mut self) -> PresentResult<()> {
        let signals = self.callbacks.lock().take_signals();
        if signals.refresh {
            self.has_changed = true;
        }
        if signals.resolution.is_some() {
            self.has_changed = true;
            self.refresh_compatibility()?;
        }
        Ok(())
    }

    fn refresh_compatibility(&mut self) -> PresentResult<()> {
        let list = match &self.surface {
            Some(surface) => {
                let formats = surface.supported_surface_formats()?;
                let (width, height) = surface.window().get_framebuffer_size();
                format::compatibility_list(&formats, Resolution::new(width, height))
            }
            None => Vec::new(),
        };

        if list != self.compatibility {
            log::debug!("Video mode compatibility changed: {} entries", list.len());
            self.compatibility = list;
            self.compatibility_changed = true;
        }
        Ok(())
    }

    fn reconfigure_params(&self) -> PresentResult<ReconfigureParams> {
        let (Some(surface), Some(mode)) = (&self.surface, &self.video_mode) else {
            return Ok(ReconfigureParams::unset());
        };
        if mode.resolution.is_empty() {
            return Ok(ReconfigureParams::unset());
        }

        let supported = surface.supported_surface_formats()?;
        match format::optimize(mode, &supported) {
            Some(optimized) => Ok(ReconfigureParams {
                extent: vk::Extent2D {
                    width: mode.resolution.width,
                    height: mode.resolution.height,
                },
                color_format: optimized.format,
                color_space: optimized.color_space,
                color_transfer: optimized.transfer,
                depth_stencil_format: self.depth_stencil_format,
            }),
            None => {
                log::warn!("Video mode {:?} cannot be presented on this surface", mode);
                Ok(ReconfigureParams::unset())
            }
        }
    }

    /// Push the current mode into the surface and (re)arm periodic updates
    fn recreate(&mut self, lock: &mut InstanceLock<'_>) -> PresentResult<()> {
        let params = self.reconfigure_params()?;
        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };

        let result = surface.reconfigure(params);
        if surface.is_configured() {
            let period = self
                .video_mode
                .and_then(|mode| mode.frame_rate.period())
                .unwrap_or(FALLBACK_PERIOD);
            lock.scheduler
                .enable_periodic_update(self.id, self.present.update_priority, period);
        } else {
            lock.scheduler.disable_periodic_update(self.id);
        }
        self.has_changed = true;
        result.map(|_| ())
    }

    fn apply_deferred_attributes(&mut self) {
        let position = self.window.position;
        let opacity = self.window.opacity;
        let state = self.state;

        if let Some(window) = self.window_mut() {
            match (position, window.is_fullscreen()) {
                (Some(position), false) => window.set_position(position),
                (Some(position), true) => window.set_windowed_position(position),
                (None, _) => {}
            }
            window.set_opacity(opacity);
            if window.get_state() != state {
                window.set_state(state);
            }
        }

        if let Some((monitor, state)) = self.window().map(|w| (w.get_monitor(), w.get_state())) {
            self.monitor = monitor;
            self.state = state;
        }
    }
}

impl<F: BackendFactory> Lifecycle for WindowConsumer<F> {
    fn open(&mut self, lock: &mut InstanceLock<'_>) -> PresentResult<()> {
        if self.surface.is_some() {
            log::warn!("Window '{}' is already open", self.window.title);
            return Ok(());
        }

        let toolkit = lock.toolkit().clone();
        let descriptor = WindowDescriptor {
            size: self.window.size,
            title: self.window.title.clone(),
            monitor: self.monitor,
            resizable: self.window.resizable,
            decorated: self.window.decorated,
        };
        let callbacks = Arc::clone(&self.callbacks);
        let variant = self.variant;
        let factory = &self.factory;

        let surface = MutexGuard::unlocked(lock, || -> PresentResult<_> {
            let window = WindowHandle::create(&toolkit, descriptor, callbacks)?;
            let backend = factory.create(&window, variant)?;
            Ok(PresentationSurface::new(backend, window, variant))
        });
        assert!(MutexGuard::mutex(lock).is_locked(), "instance lock not reacquired after open");
        let mut surface = surface?;

        surface.set_clear_color(self.present.clear_color);
        surface.set_scaling_mode(self.present.scaling_mode);
        surface.set_scaling_filter(self.present.scaling_filter);
        surface.set_camera(self.camera.clone())?;
        self.surface = Some(surface);
        log::info!("Opened window '{}'", self.window.title);

        self.apply_deferred_attributes();
        self.refresh_compatibility()?;
        self.recreate(lock)
    }

    fn close(&mut self, lock: &mut InstanceLock<'_>) {
        lock.scheduler.disable_periodic_update(self.id);

        if let Some(surface) = self.surface.take() {
            MutexGuard::unlocked(lock, move || drop(surface));
            assert!(MutexGuard::mutex(lock).is_locked(), "instance lock not reacquired after close");
            log::info!("Closed window '{}'", self.window.title);
        }

        self.last_frame = None;
        if !self.compatibility.is_empty() {
            self.compatibility.clear();
            self.compatibility_changed = true;
        }
    }

    fn is_open(&self) -> bool {
        self.surface.is_some()
    }
}

impl<F: BackendFactory> VideoConsumer for WindowConsumer<F> {
    fn video_mode_compatibility(&self) -> &[VideoModeCompatibility] {
        &self.compatibility
    }

    fn poll_compatibility_change(&mut self) -> bool {
        std::mem::take(&mut self.compatibility_changed)
    }

    fn video_mode(&self) -> Option<&VideoMode> {
        self.video_mode.as_ref()
    }

    fn set_video_mode(&mut self, lock: &mut InstanceLock<'_>, mode: Option<VideoMode>) -> PresentResult<()> {
        if mode == self.video_mode {
            return Ok(());
        }
        log::debug!("Video mode -> {:?}", mode);
        self.video_mode = mode;
        self.recreate(lock)
    }
}

impl<F: BackendFactory> RendererTarget for WindowConsumer<F> {
    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn set_camera(&mut self, lock: &mut InstanceLock<'_>, camera: Camera) -> PresentResult<()> {
        self.camera = camera;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_camera(self.camera.clone())?;
        }
        self.recreate(lock)
    }

    fn depth_stencil_format(&self) -> vk::Format {
        self.depth_stencil_format
    }

    fn set_depth_stencil_format(&mut self, lock: &mut InstanceLock<'_>, format: vk::Format) -> PresentResult<()> {
        if format == self.depth_stencil_format {
            return Ok(());
        }
        self.depth_stencil_format = format;
        self.recreate(lock)
    }
}

impl<F: BackendFactory> PeriodicUpdate for WindowConsumer<F> {
    fn update_id(&self) -> UpdateId {
        self.id
    }

    fn update(&mut self) -> PresentResult<()> {
        if self.surface.is_none() {
            return Ok(());
        }
        self.handle_window_events()?;

        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };
        match self.variant {
            SurfaceVariant::Scaler => {
                let source_changed = self.source.as_ref().is_some_and(|source| source.has_changed());
                if !self.has_changed && !source_changed {
                    return Ok(());
                }
                if source_changed {
                    if let Some(source) = self.source.as_mut() {
                        self.last_frame = source.pull();
                    }
                }
                surface.draw_frame(self.last_frame.clone())?;
            }
            SurfaceVariant::Layers => {
                let layers_changed = self.layers.iter().any(|layer| layer.has_changed());
                if !self.has_changed && !layers_changed {
                    return Ok(());
                }
                surface.draw_layers(&self.layers)?;
            }
        }

        self.has_changed = false;
        Ok(())
    }
}

impl<F: BackendFactory> Drop for WindowConsumer<F> {
    fn drop(&mut self) {
        if self.surface.is_some() {
            log::warn!(
                "Window consumer '{}' dropped while open; its periodic update stays registered",
                self.window.title
            );
        }
    }
}
