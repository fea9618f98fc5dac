//! Effect parameters, configured by the host and read-only during a frame.

use serde::{Deserialize, Serialize};

use crate::handle::TextureHandle;
use crate::render_targets::ColorPrecision;

/// Smallest alignment falloff exponent accepted by validation.
pub const MIN_ALIGNMENT_FALLOFF: f32 = 1e-5;

/// Light shafts parameter set.
///
/// Hosts validate these against the documented ranges before handing them to
/// `setup`; [`LightShaftsSettings::clamped`] applies the same ranges for hosts
/// without their own validation layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightShaftsSettings {
    /// Radial blur sample count, at least 1.
    pub blur_samples: u32,
    /// Radial sample step scale in [-1, 1]; the sign picks inward or outward bias.
    pub blur_distance: f32,
    /// Composite blend strength in [0, 1].
    pub intensity: f32,
    /// Exponent shaping the alignment weight, at least [`MIN_ALIGNMENT_FALLOFF`].
    pub alignment_falloff: f32,
    pub alignment_lower_edge: f32,
    pub alignment_upper_edge: f32,
    /// Texture dithering radial sample offsets. Registered with the backend at runtime.
    #[serde(skip)]
    pub jitter_texture: Option<TextureHandle>,
    pub jitter_factor: f32,
    /// Number of halving steps applied to the working buffer resolution.
    pub downsamples: u32,
    /// Reduced precision working buffers instead of extended-range float.
    pub lower_texture_to_16bit: bool,
    pub use_fixed_length: bool,
    /// Enables the iterative Kawase blur stage.
    pub use_additional_blurring: bool,
}

impl Default for LightShaftsSettings {
    fn default() -> Self {
        Self {
            blur_samples: 8,
            blur_distance: -0.5,
            intensity: 0.65,
            alignment_falloff: 2.0,
            alignment_lower_edge: 0.35,
            alignment_upper_edge: 0.65,
            jitter_texture: None,
            jitter_factor: 0.0,
            downsamples: 0,
            lower_texture_to_16bit: false,
            use_fixed_length: false,
            use_additional_blurring: false,
        }
    }
}

impl LightShaftsSettings {
    /// Read-only snapshot used to populate shader uniforms.
    pub fn get(&self) -> &Self {
        self
    }

    /// Copy of the settings with every numeric field forced into its valid range.
    /// NaN inputs fall back to the lower bound.
    pub fn clamped(&self) -> Self {
        Self {
            blur_samples: self.blur_samples.max(1),
            blur_distance: clamp_or(self.blur_distance, -1.0, 1.0),
            intensity: clamp_or(self.intensity, 0.0, 1.0),
            alignment_falloff: clamp_or(self.alignment_falloff, MIN_ALIGNMENT_FALLOFF, f32::MAX),
            alignment_lower_edge: clamp_or(self.alignment_lower_edge, 0.0, 1.0),
            alignment_upper_edge: clamp_or(self.alignment_upper_edge, 0.0, 1.0),
            jitter_factor: clamp_or(self.jitter_factor, 0.0, f32::MAX),
            ..self.clone()
        }
    }

    pub fn color_precision(&self) -> ColorPrecision {
        if self.lower_texture_to_16bit {
            ColorPrecision::Reduced
        } else {
            ColorPrecision::ExtendedFloat
        }
    }
}

fn clamp_or(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}
