//! Light shafts program: shader modules, bind group layout and one render
//! pipeline per sub-pass and output format.

use lightshafts_gpu_shared::shaders;
use lightshafts_gpu_shared::uniforms::{KawaseStepParams, LightShaftsParams, SubPass};

use crate::error::{LightShaftsError, Result};
use crate::passes::light_shafts::KAWASE_BLUR_RADII;
use crate::render_targets::ColorPrecision;
use crate::uniform_table::{
    UniformTable, JITTER_TEXTURE_BINDING, KAWASE_STEP_BINDING, PARAMS_BINDING, SAMPLER_BINDING,
    SOURCE_TEXTURE_BINDING,
};

/// Shared fullscreen vertex state (vertex-index-based full-screen triangle).
fn fullscreen_vertex_state(module: &wgpu::ShaderModule) -> wgpu::VertexState<'_> {
    wgpu::VertexState {
        module,
        entry_point: Some("vs_main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        buffers: &[],
    }
}

/// Adds source color onto the destination, leaving destination alpha untouched.
pub const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Bind group layout shared by every sub-pass:
///   0: uniform LightShaftsParams
///   1: texture_2d<f32> (source_texture)
///   2: sampler         (linear_sampler)
///   3: texture_2d<f32> (jitter_texture)
///   4: uniform KawaseStepParams
pub fn create_light_shafts_bgl(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let uniform = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Light Shafts BGL"),
        entries: &[
            uniform(PARAMS_BINDING),
            texture(SOURCE_TEXTURE_BINDING),
            wgpu::BindGroupLayoutEntry {
                binding: SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            texture(JITTER_TEXTURE_BINDING),
            uniform(KAWASE_STEP_BINDING),
        ],
    })
}

/// Create a fullscreen pipeline for one fragment entry point and output format.
pub fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    vert_module: &wgpu::ShaderModule,
    frag_module: &wgpu::ShaderModule,
    frag_entry: &str,
    layout: &wgpu::PipelineLayout,
    output_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: fullscreen_vertex_state(vert_module),
        fragment: Some(wgpu::FragmentState {
            module: frag_module,
            entry_point: Some(frag_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: output_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Pipelines writing into working buffers of one precision.
pub struct WorkingPipelines {
    pub copy: wgpu::RenderPipeline,
    pub extract_radial_blur: wgpu::RenderPipeline,
    pub kawase_blur: wgpu::RenderPipeline,
}

/// Everything created once when the program loads and reused every frame.
pub struct LightShaftsProgram {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub reduced: WorkingPipelines,
    pub extended: WorkingPipelines,
    /// Composite into the scene color target, additive.
    pub composite: wgpu::RenderPipeline,
    pub scene_format: wgpu::TextureFormat,
    pub params_buffer: wgpu::Buffer,
    /// One buffer per Kawase step; staged writes to a single buffer would
    /// collapse to the last value before the submit.
    pub step_buffers: Vec<wgpu::Buffer>,
    pub linear_sampler: wgpu::Sampler,
    pub uniform_table: UniformTable,
}

impl LightShaftsProgram {
    pub fn working(&self, precision: ColorPrecision) -> &WorkingPipelines {
        match precision {
            ColorPrecision::Reduced => &self.reduced,
            ColorPrecision::ExtendedFloat => &self.extended,
        }
    }

    pub fn pipeline(&self, pass: SubPass, precision: ColorPrecision) -> &wgpu::RenderPipeline {
        let working = self.working(precision);
        match pass {
            SubPass::ExtractRadialBlur => &working.extract_radial_blur,
            SubPass::IterativeBlur => &working.kawase_blur,
            SubPass::Composite => &self.composite,
        }
    }
}

/// Build the program, capturing shader and pipeline validation errors instead
/// of letting them reach the device's uncaptured error handler.
pub fn load_program(device: &wgpu::Device, scene_format: wgpu::TextureFormat) -> Result<LightShaftsProgram> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let program = create_program(device, scene_format);
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(LightShaftsError::Configuration(err.to_string())),
        None => {
            log::info!("light shafts program loaded (scene format {scene_format:?})");
            Ok(program)
        }
    }
}

fn create_program(device: &wgpu::Device, scene_format: wgpu::TextureFormat) -> LightShaftsProgram {
    let vert_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Light Shafts Fullscreen Vert"),
        source: wgpu::ShaderSource::Wgsl(shaders::FULLSCREEN_TRIANGLE_VERT.into()),
    });
    let frag_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Light Shafts Fragment"),
        source: wgpu::ShaderSource::Wgsl(shaders::LIGHT_SHAFTS_FRAG.into()),
    });

    let bind_group_layout = create_light_shafts_bgl(device);
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Light Shafts Pipeline Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let working = |precision: ColorPrecision| {
        let format = precision.texture_format();
        let make = |entry: &str, label: &str| {
            create_fullscreen_pipeline(
                device,
                &format!("{label} ({format:?})"),
                &vert_module,
                &frag_module,
                entry,
                &layout,
                format,
                None,
            )
        };
        WorkingPipelines {
            copy: make(shaders::COPY_ENTRY, "Light Shafts Copy"),
            extract_radial_blur: make(SubPass::ExtractRadialBlur.entry_point(), "Light Shafts Extract"),
            kawase_blur: make(SubPass::IterativeBlur.entry_point(), "Light Shafts Kawase Blur"),
        }
    };
    let reduced = working(ColorPrecision::Reduced);
    let extended = working(ColorPrecision::ExtendedFloat);

    let composite = create_fullscreen_pipeline(
        device,
        "Light Shafts Composite",
        &vert_module,
        &frag_module,
        SubPass::Composite.entry_point(),
        &layout,
        scene_format,
        Some(ADDITIVE_BLEND),
    );

    let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Light Shafts Params"),
        size: std::mem::size_of::<LightShaftsParams>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    // Slot 0 is the default (radius 0) bound when no step radius was set.
    let step_buffers = (0..=KAWASE_BLUR_RADII.len())
        .map(|i| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Light Shafts Kawase Step {i}")),
                size: std::mem::size_of::<KawaseStepParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })
        .collect();

    let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Light Shafts Linear Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    LightShaftsProgram {
        bind_group_layout,
        reduced,
        extended,
        composite,
        scene_format,
        params_buffer,
        step_buffers,
        linear_sampler,
        uniform_table: UniformTable::resolve(),
    }
}
