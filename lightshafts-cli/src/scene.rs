//! CPU-generated test scene: sky gradient, a sun disc and occluding trunks.

use glam::{Mat4, Vec3};
use lightshafts_wgpu::{project_light, CameraState, DirectionalLight};

pub fn camera(width: u32, height: u32, sun_forward: Vec3) -> CameraState {
    let eye = Vec3::new(0.0, 1.5, 0.0);
    CameraState {
        position: eye,
        view: Mat4::look_to_rh(eye, Vec3::NEG_Z, Vec3::Y),
        projection: Mat4::perspective_rh(60f32.to_radians(), width as f32 / height.max(1) as f32, 0.1, 500.0),
        width,
        height,
        sun: Some(DirectionalLight {
            forward: sun_forward.normalize_or_zero(),
        }),
    }
}

/// Tightly packed RGBA8 rows, top row first.
pub fn paint(camera: &CameraState) -> Vec<u8> {
    let (w, h) = (camera.width, camera.height);
    // Off-screen or behind: no disc, only sky and trunks.
    let sun = project_light(camera)
        .ok()
        .filter(|p| p.is_in_front())
        .map(|p| (p.viewport.x * w as f32, (1.0 - p.viewport.y) * h as f32));
    let sun_radius = h as f32 * 0.06;
    let trunk_period = (w / 9).max(8);
    let horizon = h * 3 / 4;

    let mut pixels = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        let t = y as f32 / h.max(1) as f32;
        for x in 0..w {
            let mut rgb = [0.35 + 0.3 * t, 0.45 + 0.25 * t, 0.75 - 0.2 * t];

            if let Some((sx, sy)) = sun {
                let d = ((x as f32 - sx).powi(2) + (y as f32 - sy).powi(2)).sqrt();
                let glow = (1.0 - d / (sun_radius * 3.0)).max(0.0).powi(2);
                let disc = if d < sun_radius { 1.0 } else { glow };
                rgb = rgb.map(|c| c + (1.0 - c) * disc);
            }

            let trunk = x % trunk_period < trunk_period / 5;
            let branch = y % 37 < 3 && x % trunk_period < trunk_period / 2;
            if trunk || branch || y >= horizon {
                rgb = [0.05, 0.06, 0.04];
            }

            pixels.extend(rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
            pixels.push(255);
        }
    }
    pixels
}
