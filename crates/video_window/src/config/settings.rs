//! # Window and Presentation Settings
//!
//! Serializable settings for every configurable part of the crate. The
//! structures are plain data with defaults and builder-style setters;
//! [`AppConfig`] bundles them for applications that load one file.

use serde::{Serialize, Deserialize};
use std::path::Path;
use std::time::Duration;

use super::{Config, ConfigError};
use crate::present::geometry::{ScalingFilter, ScalingMode};

/// Desired window attributes, applied whenever a window is (re)opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Title bar text
    pub title: String,
    /// Client area size in screen coordinates
    pub size: (u32, u32),
    /// Initial position; `None` lets the window manager decide
    pub position: Option<(i32, i32)>,
    /// Whole-window opacity in `[0, 1]`
    pub opacity: f32,
    /// Whether the window has decorations (title bar, borders)
    pub decorated: bool,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl WindowSettings {
    /// Create window settings with a title and size
    pub fn new(title: impl Into<String>, size: (u32, u32)) -> Self {
        Self {
            title: title.into(),
            size,
            ..Self::default()
        }
    }

    /// Set the initial position
    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.position = Some((x, y));
        self
    }

    /// Set the opacity
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(format!("Window size must be non-zero, got {:?}", self.size));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(format!("Window opacity must be within [0, 1], got {}", self.opacity));
        }
        Ok(())
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Video Window".to_string(),
            size: (1280, 720),
            position: None,
            opacity: 1.0,
            decorated: true,
            resizable: true,
        }
    }
}

/// How frames are placed on the presentation surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentSettings {
    /// Geometric scaling of frames into the window
    pub scaling_mode: ScalingMode,
    /// Sampling filter used when scaling
    pub scaling_filter: ScalingFilter,
    /// RGBA colour the surface is cleared to every frame
    pub clear_color: [f32; 4],
    /// Ordering of this window's update among other periodic callbacks
    pub update_priority: i32,
}

impl Default for PresentSettings {
    fn default() -> Self {
        Self {
            scaling_mode: ScalingMode::Box,
            scaling_filter: ScalingFilter::Linear,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            update_priority: 0,
        }
    }
}

/// Toolkit thread behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitSettings {
    /// Upper bound on how long the toolkit thread sleeps in its event wait
    pub wait_timeout_ms: u64,
}

impl ToolkitSettings {
    /// The wait timeout as a [`Duration`]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for ToolkitSettings {
    fn default() -> Self {
        Self { wait_timeout_ms: 100 }
    }
}

/// # Shader Configuration
///
/// SPIR-V locations of the scaler pipeline's shaders. Paths are resolved
/// against a few common directories so binaries work from the workspace root
/// as well as from their own directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = [
            "target/shaders/",
            "../target/shaders/",
            "shaders/",
            "resources/shaders/",
            "./",
        ];

        let find = |name: &str| {
            shader_dirs
                .iter()
                .map(|dir| format!("{}{}", dir, name))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("target/shaders/{}", name))
        };

        Self {
            vertex_shader_path: find(base_vertex),
            fragment_shader_path: find(base_fragment),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), String> {
        if !Path::new(&self.vertex_shader_path).exists() {
            return Err(format!("Vertex shader not found: {}", self.vertex_shader_path));
        }
        if !Path::new(&self.fragment_shader_path).exists() {
            return Err(format!("Fragment shader not found: {}", self.fragment_shader_path));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("present.vert.spv", "present.frag.spv")
    }
}

/// Vulkan device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Application name reported to the Vulkan instance
    pub application_name: String,
    /// Whether to enable validation layers; `None` follows the build type
    pub enable_validation: Option<bool>,
    /// Scaler pipeline shaders
    pub shaders: ShaderConfig,
}

impl RendererSettings {
    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            application_name: "Video Window".to_string(),
            enable_validation: None,
            shaders: ShaderConfig::default(),
        }
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration for an application hosting window consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Initial window attributes
    pub window: WindowSettings,
    /// Frame placement
    pub present: PresentSettings,
    /// Toolkit thread
    pub toolkit: ToolkitSettings,
    /// Vulkan device
    pub renderer: RendererSettings,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate().map_err(ConfigError::Invalid)?;
        if self.toolkit.wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid("Toolkit wait timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowSettings::default(),
            present: PresentSettings::default(),
            toolkit: ToolkitSettings::default(),
            renderer: RendererSettings::default(),
        }
    }
}

impl Config for AppConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_toml_partial_config_uses_defaults() {
        let text = r#"
            log_level = "debug"

            [window]
            title = "Preview"
            size = [800, 600]
            opacity = 0.5
        "#;
        let config = AppConfig::from_str_with_format(text, "app.toml").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.window.title, "Preview");
        assert_eq!(config.window.size, (800, 600));
        assert!(config.window.decorated);
        assert_eq!(config.toolkit, ToolkitSettings::default());
    }

    #[test]
    fn test_ron_config_round_trips_scaling() {
        let mut config = AppConfig::default();
        config.present.scaling_mode = ScalingMode::Crop;
        let text = ron::ser::to_string(&config).unwrap();
        let parsed = AppConfig::from_str_with_format(&text, "app.ron").unwrap();
        assert_eq!(parsed.present.scaling_mode, ScalingMode::Crop);
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let result = AppConfig::from_str_with_format("", "app.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_invalid_window_settings() {
        let settings = WindowSettings::new("T", (0, 600));
        assert!(settings.validate().is_err());
        let settings = WindowSettings::new("T", (800, 600)).with_opacity(1.5);
        assert!(settings.validate().is_err());
    }
}
