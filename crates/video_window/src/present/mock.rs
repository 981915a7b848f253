//! Recording [`GraphicsBackend`] for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ash::vk;
use nalgebra::Matrix4;
use parking_lot::{Mutex, MutexGuard};

use super::backend::{AcquireOutcome, BackendFactory, DrawContent, GraphicsBackend};
use super::geometry::{QuadVertex, ScalingFilter};
use super::params::{ReconfigureParams, SurfaceVariant};
use super::PresentResult;
use crate::video::format::ColorTransfer;
use crate::video::{Frame, FrameSource, Resolution};
use crate::window::WindowHandle;

/// One backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockOp {
    WaitFence,
    RecreateSwapchain,
    RecreateRenderPass,
    RecreateFramebuffers,
    RecreatePipeline,
    UpdateViewport,
    UpdateColorTransfer,
    UpdateGeometry,
    Release,
    Acquire,
    Record { draws: bool },
    Present,
}

/// Per-object rebuild counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MockCounts {
    pub swapchains: u32,
    pub render_passes: u32,
    pub framebuffers: u32,
    pub pipelines: u32,
    pub viewports: u32,
    pub transfers: u32,
    pub presents: u32,
}

#[derive(Debug, Default)]
pub(crate) struct MockLog {
    ops: Vec<MockOp>,
    counts: MockCounts,
}

impl MockLog {
    pub fn ops(&self) -> Vec<MockOp> {
        self.ops.clone()
    }

    pub fn counts(&self) -> MockCounts {
        self.counts
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    fn push(&mut self, op: MockOp) {
        let counts = &mut self.counts;
        match op {
            MockOp::RecreateSwapchain => counts.swapchains += 1,
            MockOp::RecreateRenderPass => counts.render_passes += 1,
            MockOp::RecreateFramebuffers => counts.framebuffers += 1,
            MockOp::RecreatePipeline => counts.pipelines += 1,
            MockOp::UpdateViewport => counts.viewports += 1,
            MockOp::UpdateColorTransfer => counts.transfers += 1,
            MockOp::Present => counts.presents += 1,
            _ => {}
        }
        self.ops.push(op);
    }
}

#[derive(Default)]
struct MockShared {
    log: Mutex<MockLog>,
    acquire_script: Mutex<VecDeque<AcquireOutcome>>,
    imposed_extent: Mutex<Option<vk::Extent2D>>,
    created: AtomicU64,
}

/// Hook run inside [`BackendFactory::create`]
pub(crate) type CreateProbe = Arc<dyn Fn() + Send + Sync>;

/// Creates [`MockBackend`]s sharing one log
#[derive(Clone)]
pub(crate) struct MockFactory {
    shared: Arc<MockShared>,
    formats: Vec<vk::SurfaceFormatKHR>,
    probe: Option<CreateProbe>,
}

impl MockFactory {
    /// Factory whose surfaces support 8 bit BGRA in sRGB
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared::default()),
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            probe: None,
        }
    }

    /// Run `probe` whenever a backend is created
    pub fn with_probe(mut self, probe: CreateProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn log(&self) -> MutexGuard<'_, MockLog> {
        self.shared.log.lock()
    }

    /// Outcomes returned by the next acquisitions, before falling back to success
    pub fn script_acquire(&self, outcomes: impl IntoIterator<Item = AcquireOutcome>) {
        self.shared.acquire_script.lock().extend(outcomes);
    }

    /// Extent the "surface" forces on every new swapchain
    pub fn impose_extent(&self, extent: Option<vk::Extent2D>) {
        *self.shared.imposed_extent.lock() = extent;
    }

    /// Backends created so far
    pub fn created(&self) -> u64 {
        self.shared.created.load(Ordering::SeqCst)
    }
}

impl BackendFactory for MockFactory {
    type Backend = MockBackend;

    fn create(&self, _window: &WindowHandle, _variant: SurfaceVariant) -> PresentResult<MockBackend> {
        if let Some(probe) = &self.probe {
            probe();
        }
        let id = self.shared.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockBackend {
            shared: Arc::clone(&self.shared),
            formats: self.formats.clone(),
            command_pool: id,
            descriptor_set_layout: id,
            targets: false,
        })
    }
}

/// Backend that records every call instead of touching a GPU
pub(crate) struct MockBackend {
    shared: Arc<MockShared>,
    formats: Vec<vk::SurfaceFormatKHR>,
    command_pool: u64,
    descriptor_set_layout: u64,
    targets: bool,
}

impl MockBackend {
    pub fn command_pool(&self) -> u64 {
        self.command_pool
    }

    pub fn descriptor_set_layout(&self) -> u64 {
        self.descriptor_set_layout
    }

    pub fn has_targets(&self) -> bool {
        self.targets
    }

    fn push(&self, op: MockOp) {
        self.shared.log.lock().push(op);
    }
}

impl GraphicsBackend for MockBackend {
    fn supported_surface_formats(&self) -> PresentResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.formats.clone())
    }

    fn wait_for_frame(&mut self) -> PresentResult<()> {
        self.push(MockOp::WaitFence);
        Ok(())
    }

    fn recreate_swapchain(&mut self, params: &ReconfigureParams) -> PresentResult<vk::Extent2D> {
        self.push(MockOp::RecreateSwapchain);
        self.targets = true;
        Ok(self.shared.imposed_extent.lock().unwrap_or(params.extent))
    }

    fn recreate_render_pass(&mut self, _params: &ReconfigureParams) -> PresentResult<()> {
        self.push(MockOp::RecreateRenderPass);
        Ok(())
    }

    fn recreate_framebuffers(&mut self, _params: &ReconfigureParams) -> PresentResult<()> {
        self.push(MockOp::RecreateFramebuffers);
        Ok(())
    }

    fn recreate_pipeline(&mut self, _params: &ReconfigureParams) -> PresentResult<()> {
        self.push(MockOp::RecreatePipeline);
        Ok(())
    }

    fn update_viewport(&mut self, _extent: vk::Extent2D, _projection: &Matrix4<f32>) -> PresentResult<()> {
        self.push(MockOp::UpdateViewport);
        Ok(())
    }

    fn update_color_transfer(&mut self, _transfer: ColorTransfer) -> PresentResult<()> {
        self.push(MockOp::UpdateColorTransfer);
        Ok(())
    }

    fn update_geometry(&mut self, _vertices: &[QuadVertex; 4]) -> PresentResult<()> {
        self.push(MockOp::UpdateGeometry);
        Ok(())
    }

    fn release_targets(&mut self) {
        self.push(MockOp::Release);
        self.targets = false;
    }

    fn acquire_image(&mut self) -> PresentResult<AcquireOutcome> {
        self.push(MockOp::Acquire);
        Ok(self
            .shared
            .acquire_script
            .lock()
            .pop_front()
            .unwrap_or(AcquireOutcome::Ready(0)))
    }

    fn record(&mut self, _image_index: u32, _clear_values: &[vk::ClearValue], content: DrawContent<'_>) -> PresentResult<()> {
        self.push(MockOp::Record { draws: content.draws() });
        Ok(())
    }

    fn submit_and_present(&mut self, _image_index: u32) -> PresentResult<()> {
        self.push(MockOp::Present);
        Ok(())
    }
}

/// Frame with a resolution and nothing else
pub(crate) struct TestFrame {
    resolution: Resolution,
}

impl TestFrame {
    pub fn shared(width: u32, height: u32) -> Arc<dyn Frame> {
        Arc::new(Self { resolution: Resolution::new(width, height) })
    }
}

impl Frame for TestFrame {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn descriptor_set(&self, _filter: ScalingFilter) -> vk::DescriptorSet {
        vk::DescriptorSet::null()
    }
}

/// Source handing out one frame whenever it is flagged as changed
pub(crate) struct TestSource {
    frame: Arc<dyn Frame>,
    changed: Arc<AtomicBool>,
}

impl TestSource {
    pub fn new(frame: Arc<dyn Frame>) -> (Self, Arc<AtomicBool>) {
        let changed = Arc::new(AtomicBool::new(true));
        (Self { frame, changed: Arc::clone(&changed) }, changed)
    }
}

impl FrameSource for TestSource {
    fn has_changed(&self) -> bool {
        self.changed.load(Ordering::SeqCst)
    }

    fn pull(&mut self) -> Option<Arc<dyn Frame>> {
        self.changed.store(false, Ordering::SeqCst);
        Some(Arc::clone(&self.frame))
    }
}
