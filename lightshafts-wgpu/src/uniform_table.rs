//! Semantic shader parameter names and where they live in the GPU uniform blocks.

use std::collections::HashMap;
use std::mem::offset_of;

use lightshafts_gpu_shared::uniforms::{KawaseStepParams, LightShaftsParams};

use crate::projector::LightScreenPosition;
use crate::settings::LightShaftsSettings;

/// Every parameter the light shafts program reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformName {
    BlurSamples,
    BlurDistance,
    BlurCenterUv,
    Intensity,
    AlignmentFalloff,
    AlignmentLowerEdge,
    AlignmentUpperEdge,
    KawaseBlurStepRadius,
    JitterTexture,
    JitterFactor,
    UseFixedLength,
}

impl UniformName {
    pub const ALL: [UniformName; 11] = [
        UniformName::BlurSamples,
        UniformName::BlurDistance,
        UniformName::BlurCenterUv,
        UniformName::Intensity,
        UniformName::AlignmentFalloff,
        UniformName::AlignmentLowerEdge,
        UniformName::AlignmentUpperEdge,
        UniformName::KawaseBlurStepRadius,
        UniformName::JitterTexture,
        UniformName::JitterFactor,
        UniformName::UseFixedLength,
    ];

    /// Shader-facing property name.
    pub fn shader_name(self) -> &'static str {
        match self {
            UniformName::BlurSamples => "_BlurSamples",
            UniformName::BlurDistance => "_BlurDistance",
            UniformName::BlurCenterUv => "_BlurCenterUV",
            UniformName::Intensity => "_Intensity",
            UniformName::AlignmentFalloff => "_AlignmentFalloff",
            UniformName::AlignmentLowerEdge => "_AlignmentLowerEdge",
            UniformName::AlignmentUpperEdge => "_AlignmentUpperEdge",
            UniformName::KawaseBlurStepRadius => "_KawaseBlurStepRadius",
            UniformName::JitterTexture => "_JitterTexture",
            UniformName::JitterFactor => "_JitterFactor",
            UniformName::UseFixedLength => "USE_FIXED_LENGTH",
        }
    }
}

/// Scalar layout of a field in `LightShaftsParams`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Int,
    /// `u32`, 0 or 1.
    Bool,
    Vec4,
}

/// Backend location of one parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformSlot {
    /// Byte offset inside `LightShaftsParams` (binding 0).
    Params { offset: usize, ty: UniformType },
    /// `f32` at a byte offset inside `KawaseStepParams` (binding 4).
    KawaseStep { offset: usize },
    /// Texture binding in group 0.
    Texture { binding: u32 },
}

pub const PARAMS_BINDING: u32 = 0;
pub const SOURCE_TEXTURE_BINDING: u32 = 1;
pub const SAMPLER_BINDING: u32 = 2;
pub const JITTER_TEXTURE_BINDING: u32 = 3;
pub const KAWASE_STEP_BINDING: u32 = 4;

/// Name → slot mapping, resolved once when the program is loaded.
#[derive(Clone, Debug)]
pub struct UniformTable {
    slots: HashMap<UniformName, UniformSlot>,
}

impl UniformTable {
    pub fn resolve() -> Self {
        let slots = UniformName::ALL
            .into_iter()
            .map(|name| (name, Self::locate(name)))
            .collect();
        Self { slots }
    }

    fn locate(name: UniformName) -> UniformSlot {
        use UniformType::{Bool, Float, Int, Vec4};
        let params = |offset, ty| UniformSlot::Params { offset, ty };
        match name {
            UniformName::BlurSamples => params(offset_of!(LightShaftsParams, blur_samples), Int),
            UniformName::BlurDistance => params(offset_of!(LightShaftsParams, blur_distance), Float),
            UniformName::BlurCenterUv => params(offset_of!(LightShaftsParams, blur_center_uv), Vec4),
            UniformName::Intensity => params(offset_of!(LightShaftsParams, intensity), Float),
            UniformName::AlignmentFalloff => params(offset_of!(LightShaftsParams, alignment_falloff), Float),
            UniformName::AlignmentLowerEdge => params(offset_of!(LightShaftsParams, alignment_lower_edge), Float),
            UniformName::AlignmentUpperEdge => params(offset_of!(LightShaftsParams, alignment_upper_edge), Float),
            UniformName::JitterFactor => params(offset_of!(LightShaftsParams, jitter_factor), Float),
            UniformName::UseFixedLength => params(offset_of!(LightShaftsParams, use_fixed_length), Bool),
            UniformName::KawaseBlurStepRadius => UniformSlot::KawaseStep {
                offset: offset_of!(KawaseStepParams, step_radius),
            },
            UniformName::JitterTexture => UniformSlot::Texture {
                binding: JITTER_TEXTURE_BINDING,
            },
        }
    }

    pub fn slot(&self, name: UniformName) -> UniformSlot {
        self.slots
            .get(&name)
            .copied()
            .unwrap_or_else(|| Self::locate(name))
    }

    /// Write `value` into `step` if `name` lives in the Kawase step block.
    /// Parameters in the frame block are packed once by `pack_params`.
    pub fn write_step_f32(&self, name: UniformName, value: f32, step: &mut KawaseStepParams) -> bool {
        match self.slot(name) {
            UniformSlot::KawaseStep { offset } => {
                bytemuck::bytes_of_mut(step)[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
                true
            }
            _ => false,
        }
    }
}

/// Pack the frame's parameter snapshot into the GPU uniform block.
pub fn pack_params(
    settings: &LightShaftsSettings,
    center: LightScreenPosition,
    has_jitter_texture: bool,
) -> LightShaftsParams {
    LightShaftsParams {
        blur_center_uv: center.to_uniform(),
        blur_samples: settings.blur_samples.min(i32::MAX as u32) as i32,
        blur_distance: settings.blur_distance,
        intensity: settings.intensity,
        alignment_falloff: settings.alignment_falloff,
        alignment_lower_edge: settings.alignment_lower_edge,
        alignment_upper_edge: settings.alignment_upper_edge,
        jitter_factor: settings.jitter_factor,
        use_fixed_length: settings.use_fixed_length as u32,
        has_jitter_texture: has_jitter_texture as u32,
        ..Default::default()
    }
}
