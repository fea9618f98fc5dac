//! Data shared between the CPU side of the light shafts effect and its WGSL kernels.

pub mod shaders;
pub mod uniforms;
