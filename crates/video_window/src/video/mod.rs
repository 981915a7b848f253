//! Video mode model and negotiation
//!
//! A [`VideoMode`] fully describes the frames a consumer will receive. A
//! consumer advertises what it can accept as a list of
//! [`VideoModeCompatibility`] records; a negotiator picks one concrete mode
//! out of them and hands it back.

pub mod format;
pub mod frame;

use std::cmp::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use format::{ColorTransfer, OptimizedFormat};
pub use frame::{Frame, FrameSource, Layer, LayerContext};

/// Frame rate as a rational number of frames per second
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rate {
    /// Numerator
    pub num: u32,
    /// Denominator
    pub den: u32,
}

impl Rate {
    /// `num / den` frames per second
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Frames per second as a float
    pub fn as_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }

    /// Time between frames, `None` for a zero rate
    pub fn period(self) -> Option<Duration> {
        (self.num != 0 && self.den != 0)
            .then(|| Duration::from_nanos(u64::from(self.den) * 1_000_000_000 / u64::from(self.num)))
    }
}

impl PartialEq for Rate {
    fn eq(&self, other: &Self) -> bool {
        u64::from(self.num) * u64::from(other.den) == u64::from(other.num) * u64::from(self.den)
    }
}

impl Eq for Rate {}

impl PartialOrd for Rate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let lhs = u64::from(self.num) * u64::from(other.den);
        let rhs = u64::from(other.num) * u64::from(self.den);
        Some(lhs.cmp(&rhs))
    }
}

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Resolution {
    /// Resolution of `width` x `height`
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Pixel aspect ratio
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Numerator
    pub num: u32,
    /// Denominator
    pub den: u32,
}

impl AspectRatio {
    /// Square pixels
    pub const SQUARE: Self = Self { num: 1, den: 1 };

    /// Ratio as a float, 1.0 when undefined
    pub fn as_f32(self) -> f32 {
        if self.num == 0 || self.den == 0 {
            1.0
        } else {
            self.num as f32 / self.den as f32
        }
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

impl PartialEq for AspectRatio {
    fn eq(&self, other: &Self) -> bool {
        u64::from(self.num) * u64::from(other.den) == u64::from(other.num) * u64::from(self.den)
    }
}

impl Eq for AspectRatio {}

impl PartialOrd for AspectRatio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let lhs = u64::from(self.num) * u64::from(other.den);
        let rhs = u64::from(other.num) * u64::from(self.den);
        Some(lhs.cmp(&rhs))
    }
}

/// Colour primaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Serialize, Deserialize)]
pub enum ColorPrimaries {
    /// ITU-R BT.709 / sRGB
    Bt709,
    /// ITU-R BT.2020
    Bt2020,
    /// Display P3
    DisplayP3,
    /// Adobe RGB (1998)
    AdobeRgb,
}

/// Encoding of colour components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Serialize, Deserialize)]
pub enum ColorModel {
    /// Plain RGB
    Rgb,
    /// Y'CbCr with BT.601 coefficients
    YCbCrBt601,
    /// Y'CbCr with BT.709 coefficients
    YCbCrBt709,
    /// Y'CbCr with BT.2020 coefficients
    YCbCrBt2020,
}

/// Opto-electronic transfer function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Default, Serialize, Deserialize)]
pub enum ColorTransferFunction {
    /// No encoding
    #[default]
    Linear,
    /// IEC 61966-2-1
    Srgb,
    /// ITU-R BT.1886
    Bt1886,
    /// SMPTE ST 2084 (PQ)
    Pq,
}

impl ColorTransferFunction {
    /// Index understood by the presentation shader
    pub fn shader_index(self) -> i32 {
        match self {
            Self::Linear => 0,
            Self::Srgb => 1,
            Self::Bt1886 => 2,
            Self::Pq => 3,
        }
    }
}

/// Chroma subsampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Serialize, Deserialize)]
pub enum ColorSubsampling {
    /// No subsampling
    Rb444,
    /// Horizontal subsampling
    Rb422,
    /// Horizontal and vertical subsampling
    Rb420,
}

/// Quantization range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Serialize, Deserialize)]
pub enum ColorRange {
    /// Full code range
    Full,
    /// ITU narrow range
    Itu,
}

/// Pixel layout of presented images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Serialize, Deserialize)]
pub enum ColorFormat {
    /// 8 bit RGBA
    R8G8B8A8,
    /// 8 bit BGRA
    B8G8R8A8,
    /// 10 bit RGB, 2 bit alpha
    A2B10G10R10,
    /// 16 bit unsigned normalized RGBA
    R16G16B16A16,
    /// 16 bit float RGBA
    R16G16B16A16Sfloat,
}

/// Complete description of a video stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMode {
    /// Frames per second
    pub frame_rate: Rate,
    /// Frame size
    pub resolution: Resolution,
    /// Shape of one pixel
    pub pixel_aspect_ratio: AspectRatio,
    /// Primaries
    pub color_primaries: ColorPrimaries,
    /// Component encoding
    pub color_model: ColorModel,
    /// Transfer function
    pub color_transfer_function: ColorTransferFunction,
    /// Chroma subsampling
    pub color_subsampling: ColorSubsampling,
    /// Quantization range
    pub color_range: ColorRange,
    /// Pixel layout
    pub color_format: ColorFormat,
}

/// Constraint on one video mode attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Limit<T> {
    /// Any value
    Any,
    /// Exactly this value
    Fixed(T),
    /// Inclusive range
    Range {
        /// Lower bound
        min: T,
        /// Upper bound
        max: T,
    },
    /// One of these values
    OneOf(Vec<T>),
}

impl<T: PartialOrd + Clone> Limit<T> {
    /// Whether `value` satisfies the constraint
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Fixed(fixed) => fixed == value,
            Self::Range { min, max } => min <= value && value <= max,
            Self::OneOf(values) => values.contains(value),
        }
    }

    /// Pick a value, preferring `preferred` when it is allowed
    pub fn pick(&self, preferred: Option<&T>) -> Option<T> {
        if let Some(preferred) = preferred {
            if self.accepts(preferred) {
                return Some(preferred.clone());
            }
        }
        match self {
            Self::Any => None,
            Self::Fixed(value) => Some(value.clone()),
            Self::Range { max, .. } => Some(max.clone()),
            Self::OneOf(values) => values.first().cloned(),
        }
    }
}

/// One family of video modes a consumer accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoModeCompatibility {
    /// Frame rate
    pub frame_rate: Limit<Rate>,
    /// Resolution
    pub resolution: Limit<Resolution>,
    /// Pixel aspect ratio
    pub pixel_aspect_ratio: Limit<AspectRatio>,
    /// Primaries
    pub color_primaries: Limit<ColorPrimaries>,
    /// Component encoding
    pub color_model: Limit<ColorModel>,
    /// Transfer function
    pub color_transfer_function: Limit<ColorTransferFunction>,
    /// Chroma subsampling
    pub color_subsampling: Limit<ColorSubsampling>,
    /// Quantization range
    pub color_range: Limit<ColorRange>,
    /// Pixel layout
    pub color_format: Limit<ColorFormat>,
}

impl VideoModeCompatibility {
    /// Whether `mode` falls inside this family
    pub fn accepts(&self, mode: &VideoMode) -> bool {
        self.frame_rate.accepts(&mode.frame_rate)
            && self.resolution.accepts(&mode.resolution)
            && self.pixel_aspect_ratio.accepts(&mode.pixel_aspect_ratio)
            && self.color_primaries.accepts(&mode.color_primaries)
            && self.color_model.accepts(&mode.color_model)
            && self.color_transfer_function.accepts(&mode.color_transfer_function)
            && self.color_subsampling.accepts(&mode.color_subsampling)
            && self.color_range.accepts(&mode.color_range)
            && self.color_format.accepts(&mode.color_format)
    }

    /// Pick a concrete mode, using `frame_rate` where the rate is open
    ///
    /// Returns `None` when some attribute other than the rate is left
    /// unconstrained.
    pub fn negotiate(&self, frame_rate: Rate) -> Option<VideoMode> {
        Some(VideoMode {
            frame_rate: self.frame_rate.pick(Some(&frame_rate))?,
            resolution: self.resolution.pick(None)?,
            pixel_aspect_ratio: self.pixel_aspect_ratio.pick(Some(&AspectRatio::SQUARE))?,
            color_primaries: self.color_primaries.pick(None)?,
            color_model: self.color_model.pick(None)?,
            color_transfer_function: self.color_transfer_function.pick(None)?,
            color_subsampling: self.color_subsampling.pick(None)?,
            color_range: self.color_range.pick(None)?,
            color_format: self.color_format.pick(None)?,
        })
    }
}

/// First mode any of `compatibilities` yields, or `None` if the list is
/// empty or unsatisfiable
pub fn negotiate(compatibilities: &[VideoModeCompatibility], frame_rate: Rate) -> Option<VideoMode> {
    compatibilities.iter().find_map(|compat| compat.negotiate(frame_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn compat() -> VideoModeCompatibility {
        VideoModeCompatibility {
            frame_rate: Limit::Any,
            resolution: Limit::Fixed(Resolution::new(1280, 720)),
            pixel_aspect_ratio: Limit::Fixed(AspectRatio::SQUARE),
            color_primaries: Limit::Fixed(ColorPrimaries::Bt709),
            color_model: Limit::Fixed(ColorModel::Rgb),
            color_transfer_function: Limit::OneOf(vec![ColorTransferFunction::Srgb, ColorTransferFunction::Linear]),
            color_subsampling: Limit::Fixed(ColorSubsampling::Rb444),
            color_range: Limit::Fixed(ColorRange::Full),
            color_format: Limit::Fixed(ColorFormat::B8G8R8A8),
        }
    }

    #[test]
    fn test_rate_compares_as_rational() {
        assert_eq!(Rate::new(60, 1), Rate::new(120, 2));
        assert!(Rate::new(30000, 1001) < Rate::new(30, 1));
        assert_eq!(Rate::new(50, 1).period(), Some(Duration::from_millis(20)));
        assert_eq!(Rate::new(0, 1).period(), None);
    }

    #[test]
    fn test_limit_accepts() {
        let range = Limit::Range { min: Rate::new(24, 1), max: Rate::new(60, 1) };
        assert!(range.accepts(&Rate::new(30, 1)));
        assert!(!range.accepts(&Rate::new(120, 1)));
        assert_eq!(range.pick(Some(&Rate::new(240, 1))), Some(Rate::new(60, 1)));
        assert_eq!(Limit::<Rate>::Any.pick(None), None);
    }

    #[test]
    fn test_negotiate_uses_requested_rate() {
        let mode = compat().negotiate(Rate::new(50, 1)).unwrap();
        assert_eq!(mode.frame_rate, Rate::new(50, 1));
        assert_eq!(mode.resolution, Resolution::new(1280, 720));
        assert_eq!(mode.color_transfer_function, ColorTransferFunction::Srgb);
        assert!(compat().accepts(&mode));
    }

    #[test]
    fn test_negotiate_fails_on_open_attribute() {
        let mut open = compat();
        open.resolution = Limit::Any;
        assert!(open.negotiate(Rate::new(60, 1)).is_none());
        assert!(negotiate(&[], Rate::new(60, 1)).is_none());
    }
}
