//! Projects the directional light into viewport space once per frame.

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::error::{LightShaftsError, Result};

/// Directional light, described only by the direction it shines along.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub forward: Vec3,
}

/// Camera state handed over by the host for one camera-frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    /// Resolution of the camera color target.
    pub width: u32,
    pub height: u32,
    pub sun: Option<DirectionalLight>,
}

impl CameraState {
    pub fn world_to_clip(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Radial blur convergence point. `viewport` has its origin at the bottom-left
/// corner, `depth` is the distance along the view axis and is negative when the
/// light points away from the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightScreenPosition {
    pub viewport: Vec2,
    pub depth: f32,
}

impl LightScreenPosition {
    pub fn is_in_front(&self) -> bool {
        self.depth > 0.0
    }

    pub fn to_uniform(self) -> [f32; 4] {
        [self.viewport.x, self.viewport.y, self.depth, 0.0]
    }
}

/// Project the point one unit along the sun direction from the camera.
///
/// Directional lights have no position; `camera + forward` is a proxy point
/// that lands on the correct screen direction.
pub fn project_light(camera: &CameraState) -> Result<LightScreenPosition> {
    let sun = camera.sun.ok_or(LightShaftsError::NoDirectionalLight)?;
    let sun_position_ws = camera.position + sun.forward;
    world_to_viewport_point(camera, sun_position_ws)
}

pub fn world_to_viewport_point(camera: &CameraState, point: Vec3) -> Result<LightScreenPosition> {
    let clip = camera.world_to_clip() * point.extend(1.0);
    if clip.w.abs() <= f32::EPSILON || !clip.is_finite() {
        return Err(LightShaftsError::DegenerateProjection);
    }
    let ndc = clip.xy() / clip.w;
    let viewport = ndc * 0.5 + Vec2::splat(0.5);

    // View space looks down -Z for right-handed cameras; report positive depth in front.
    let view_pos = camera.view * point.extend(1.0);
    let depth = if camera.projection.z_axis.w > 0.0 {
        view_pos.z
    } else {
        -view_pos.z
    };

    Ok(LightScreenPosition { viewport, depth })
}
