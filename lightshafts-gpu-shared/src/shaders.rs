/// Embedded WGSL shader source strings for the light shafts effect.

pub const FULLSCREEN_TRIANGLE_VERT: &str = include_str!("../shaders/fullscreen_triangle.wgsl");
pub const LIGHT_SHAFTS_FRAG: &str = include_str!("../shaders/light_shafts.wgsl");

/// Fragment entry point of the plain (shader-less) blit used for downsampling.
pub const COPY_ENTRY: &str = "fs_copy";
