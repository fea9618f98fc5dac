use bytemuck::{Pod, Zeroable};

/// Light shafts parameters. Matches `LightShaftsParams` in light_shafts.wgsl,
/// bind group 0, binding 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightShaftsParams {
    /// xy = viewport position of the blur center (origin bottom-left), z = view depth.
    pub blur_center_uv: [f32; 4],
    pub blur_samples: i32,
    pub blur_distance: f32,
    pub intensity: f32,
    pub alignment_falloff: f32,
    pub alignment_lower_edge: f32,
    pub alignment_upper_edge: f32,
    pub jitter_factor: f32,
    /// Runtime stand-in for the `USE_FIXED_LENGTH` shader keyword (0 or 1).
    pub use_fixed_length: u32,
    pub has_jitter_texture: u32,
    pub _pad1: u32,
    pub _pad2: u32,
    pub _pad3: u32,
}

/// Per-invocation Kawase step, bind group 0 binding 4.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct KawaseStepParams {
    pub step_radius: f32,
    pub _pad1: f32,
    pub _pad2: f32,
    pub _pad3: f32,
}

/// Shader sub-programs of the light shafts program, by pass index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubPass {
    ExtractRadialBlur = 0,
    IterativeBlur = 1,
    Composite = 2,
}

impl SubPass {
    pub const ALL: [SubPass; 3] = [SubPass::ExtractRadialBlur, SubPass::IterativeBlur, SubPass::Composite];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.index() == index)
    }

    /// Fragment entry point in light_shafts.wgsl.
    pub fn entry_point(self) -> &'static str {
        match self {
            SubPass::ExtractRadialBlur => "fs_extract_radial_blur",
            SubPass::IterativeBlur => "fs_kawase_blur",
            SubPass::Composite => "fs_composite",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_block_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightShaftsParams>(), 64);
        assert_eq!(std::mem::size_of::<LightShaftsParams>() % 16, 0);
        assert_eq!(std::mem::size_of::<KawaseStepParams>(), 16);
    }

    #[test]
    fn sub_pass_indices_are_stable() {
        assert_eq!(SubPass::ExtractRadialBlur.index(), 0);
        assert_eq!(SubPass::IterativeBlur.index(), 1);
        assert_eq!(SubPass::Composite.index(), 2);
        assert_eq!(SubPass::from_index(1), Some(SubPass::IterativeBlur));
        assert_eq!(SubPass::from_index(3), None);
    }
}
