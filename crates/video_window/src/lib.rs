//! # Video Window
//!
//! Windowed video presentation on Vulkan.
//!
//! ## Features
//!
//! - **Toolkit thread**: every native windowing call runs on one dedicated
//!   thread; requests from other threads are marshaled and awaited
//! - **Window consumers**: windows that keep their configuration while
//!   closed and open asynchronously without holding the instance lock
//! - **Swapchain reconfiguration**: only the objects a mode change actually
//!   invalidates are rebuilt
//! - **Video mode negotiation**: presentable modes are derived from the
//!   surface's supported formats and the current framebuffer size
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use video_window::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::default();
//!     let instance = Instance::with_glfw(&config.toolkit)?;
//!     let extensions = instance.toolkit().execute(|tk| tk.required_instance_extensions());
//!     let context = Arc::new(VulkanContext::new(&config.renderer, &extensions)?);
//!     let factory = VulkanFactory::new(context, config.renderer.shaders.clone());
//!
//!     let mut window = WindowConsumer::scaler(factory, config.window.clone(), config.present.clone());
//!     let mut lock = instance.lock();
//!     window.open(&mut lock)?;
//!     if let Some(mode) = negotiate(window.video_mode_compatibility(), Rate::new(60, 1)) {
//!         window.set_video_mode(&mut lock, Some(mode))?;
//!     }
//!     window.close(&mut lock);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

pub mod config;
pub mod consumer;
pub mod foundation;
pub mod instance;
pub mod present;
pub mod scheduler;
pub mod toolkit;
pub mod video;
pub mod window;

pub use consumer::WindowConsumer;
pub use instance::{Instance, InstanceLock};

/// Common imports for applications
pub mod prelude {
    pub use crate::config::{AppConfig, Config, PresentSettings, RendererSettings, WindowSettings};
    pub use crate::consumer::{Camera, Lifecycle, PeriodicUpdate, RendererTarget, VideoConsumer, WindowConsumer};
    pub use crate::instance::{Instance, InstanceLock};
    pub use crate::present::vulkan::{VulkanContext, VulkanFactory};
    pub use crate::present::{PresentError, PresentResult, ScalingFilter, ScalingMode};
    pub use crate::scheduler::UpdateId;
    pub use crate::toolkit::{ToolkitError, ToolkitResult};
    pub use crate::video::{negotiate, Frame, FrameSource, Layer, Rate, Resolution, VideoMode, VideoModeCompatibility};
    pub use crate::window::{Key, KeyAction, MonitorHandle, WindowCallbacks, WindowState};
}
