//! Render pass implementations for the light shafts effect.

pub mod light_shafts;
