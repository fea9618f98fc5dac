//! Light shafts filter sequence: downsample, extract + radial blur, optional
//! Kawase blur, composite. Plus the wgpu helpers each command records with.

use lightshafts_gpu_shared::uniforms::SubPass;

use crate::command_list::CommandList;
use crate::render_targets::TargetId;
use crate::settings::LightShaftsSettings;
use crate::uniform_table::UniformName;

/// Profiling scope name wrapped around the filter sequence.
pub const PASS_NAME: &str = "VolumetricLightShaftsPass";

/// Kawase step radii, in execution order. Independent of `blur_samples`.
pub const KAWASE_BLUR_RADII: [u32; 5] = [0, 1, 2, 2, 3];

/// Opaque black, used to clear buffer A before the sequence runs.
pub const CLEAR_COLOR: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

/// Record the full filter sequence for one frame.
///
/// `pending_clear` is the target Setup configured for clearing; it is cleared
/// before the profiling scope opens. Buffer A holds the current result after
/// every stage.
pub fn build_filter_commands(settings: &LightShaftsSettings, pending_clear: Option<TargetId>, list: &mut CommandList) {
    if let Some(target) = pending_clear {
        list.clear_target(target, CLEAR_COLOR);
    }

    list.begin_scope(PASS_NAME);

    // Downsampling
    list.blit(TargetId::SceneColor, TargetId::BufferB);
    list.blit_with(TargetId::BufferB, TargetId::BufferA, SubPass::ExtractRadialBlur);

    if settings.use_additional_blurring {
        for radius in KAWASE_BLUR_RADII {
            list.set_global_float(UniformName::KawaseBlurStepRadius, radius as f32);
            list.blit_with(TargetId::BufferA, TargetId::BufferB, SubPass::IterativeBlur);
            list.blit(TargetId::BufferB, TargetId::BufferA);
        }
    }

    list.blit_with(TargetId::BufferA, TargetId::SceneColor, SubPass::Composite);

    list.end_scope();
}

/// Number of filter operations `build_filter_commands` records.
pub fn expected_filter_ops(settings: &LightShaftsSettings) -> usize {
    let kawase = if settings.use_additional_blurring {
        KAWASE_BLUR_RADII.len() * 2
    } else {
        0
    };
    2 + kawase + 1
}

/// Draw a fullscreen triangle into `target_view`.
pub fn render_fullscreen_blit(
    encoder: &mut wgpu::CommandEncoder,
    target_view: &wgpu::TextureView,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    load: wgpu::LoadOp<wgpu::Color>,
    label: &str,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });

    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

/// Clear a target without drawing.
pub fn clear_target(encoder: &mut wgpu::CommandEncoder, target_view: &wgpu::TextureView, color: [f64; 4]) {
    let [r, g, b, a] = color;
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Light Shafts Clear"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });
}

/// Texel copy between two same-sized, same-format targets.
pub fn copy_target(
    encoder: &mut wgpu::CommandEncoder,
    source: &wgpu::Texture,
    destination: &wgpu::Texture,
    width: u32,
    height: u32,
) {
    encoder.copy_texture_to_texture(
        wgpu::ImageCopyTexture {
            texture: source,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyTexture {
            texture: destination,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
