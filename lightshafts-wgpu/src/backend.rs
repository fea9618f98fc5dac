//! GPU backend seam driven by the lifecycle controller, and its wgpu implementation.

use std::sync::Arc;

use lightshafts_gpu_shared::uniforms::{KawaseStepParams, LightShaftsParams, SubPass};

use crate::command_list::{CommandList, FilterCommand};
use crate::error::{LightShaftsError, Result};
use crate::handle::{HandleStore, TextureHandle};
use crate::passes::light_shafts::{clear_target, copy_target, render_fullscreen_blit};
use crate::pipeline::{self, LightShaftsProgram};
use crate::render_targets::{self, ColorPrecision, RenderTarget, TargetId, TargetPool, WorkingBufferDescriptor};
use crate::uniform_table::{
    JITTER_TEXTURE_BINDING, KAWASE_STEP_BINDING, PARAMS_BINDING, SAMPLER_BINDING,
    SOURCE_TEXTURE_BINDING,
};

/// What the lifecycle controller needs from a GPU backend.
pub trait ShaftsBackend {
    /// Host-owned scene color target type.
    type SceneColor: ?Sized;

    /// Build the shader program bundle. Called once until it fails or is reloaded.
    fn load_program(&mut self) -> Result<()>;

    /// Check out a working buffer from the pool.
    fn allocate_target(&mut self, id: TargetId, descriptor: &WorkingBufferDescriptor) -> Result<()>;

    /// Return a working buffer to the pool. Unknown ids are ignored.
    fn release_target(&mut self, id: TargetId);

    /// Bind the jitter texture; returns whether a real texture is bound.
    fn set_jitter_texture(&mut self, handle: Option<TextureHandle>) -> bool;

    /// Upload the frame's uniform block.
    fn write_params(&mut self, params: &LightShaftsParams);

    /// Record `commands` into one GPU command buffer and submit it.
    fn submit(&mut self, commands: &CommandList, scene_color: &Self::SceneColor) -> Result<()>;
}

/// wgpu implementation: owns the program, the working buffer pool and
/// registered textures.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    scene_format: wgpu::TextureFormat,
    program: Option<LightShaftsProgram>,
    targets: TargetPool<RenderTarget>,
    descriptor: Option<WorkingBufferDescriptor>,
    textures: HandleStore<RenderTarget>,
    jitter: Option<TextureHandle>,
    _default_texture: wgpu::Texture,
    default_view: wgpu::TextureView,
    params: LightShaftsParams,
}

impl WgpuBackend {
    /// `scene_format` is the format of the color targets `submit` composites into.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, scene_format: wgpu::TextureFormat) -> Self {
        let (default_texture, default_view) = render_targets::create_default_texture(&device, &queue, [0, 0, 0, 255]);
        Self {
            device,
            queue,
            scene_format,
            program: None,
            targets: TargetPool::new(),
            descriptor: None,
            textures: HandleStore::new(),
            jitter: None,
            _default_texture: default_texture,
            default_view,
            params: LightShaftsParams::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn scene_format(&self) -> wgpu::TextureFormat {
        self.scene_format
    }

    /// Register a texture (e.g. a blue-noise jitter pattern) and get a handle for the settings.
    ///
    /// The texture must be a single-sampled 2D texture with `TEXTURE_BINDING`
    /// usage and a filterable float format, since it is bound next to the
    /// linear sampler.
    pub fn register_texture(&mut self, texture: wgpu::Texture) -> Result<TextureHandle> {
        check_sampleable(&texture, self.device.features())?;
        Ok(TextureHandle(self.textures.insert(RenderTarget::from_texture(texture))))
    }

    pub fn unregister_texture(&mut self, handle: TextureHandle) -> Option<wgpu::Texture> {
        if self.jitter == Some(handle) {
            self.jitter = None;
        }
        self.textures.remove(handle.0).map(|t| t.color_texture)
    }

    /// Working buffer currently checked out under `id`.
    pub fn target(&self, id: TargetId) -> Option<&RenderTarget> {
        self.targets.get(id)
    }

    /// Drop pooled working buffers that are not checked out (after a resize, say).
    pub fn trim_targets(&mut self) {
        self.targets.trim();
    }

    pub fn working_buffer_allocations(&self) -> u64 {
        self.targets.allocation_count()
    }

    fn jitter_view(&self) -> &wgpu::TextureView {
        self.jitter
            .and_then(|h| self.textures.get(h.0))
            .map(|t| &t.color_view)
            .unwrap_or(&self.default_view)
    }
}

impl ShaftsBackend for WgpuBackend {
    type SceneColor = RenderTarget;

    fn load_program(&mut self) -> Result<()> {
        self.program = Some(pipeline::load_program(&self.device, self.scene_format)?);
        Ok(())
    }

    fn allocate_target(&mut self, id: TargetId, descriptor: &WorkingBufferDescriptor) -> Result<()> {
        descriptor.check(id, self.device.limits().max_texture_dimension_2d)?;

        let device = &self.device;
        self.targets.acquire_with(id, descriptor, |d| {
            device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
            let target = render_targets::create_working_buffer(device, d, id.label());
            match pollster::block_on(device.pop_error_scope()) {
                Some(err) => Err(LightShaftsError::allocation(id, err)),
                None => Ok(target),
            }
        })?;
        self.descriptor = Some(*descriptor);
        Ok(())
    }

    fn release_target(&mut self, id: TargetId) {
        self.targets.release(id);
    }

    fn set_jitter_texture(&mut self, handle: Option<TextureHandle>) -> bool {
        self.jitter = handle.filter(|h| self.textures.get(h.0).is_some());
        if handle.is_some() && self.jitter.is_none() {
            log::warn!("jitter texture {handle:?} is not registered; jitter disabled");
        }
        self.jitter.is_some()
    }

    fn write_params(&mut self, params: &LightShaftsParams) {
        self.params = *params;
    }

    fn submit(&mut self, commands: &CommandList, scene_color: &RenderTarget) -> Result<()> {
        let program = self.program.as_ref().ok_or(LightShaftsError::ProgramUnavailable)?;
        let descriptor = self.descriptor.ok_or(LightShaftsError::MissingTarget(TargetId::BufferA))?;
        commands.validate()?;
        if scene_color.format() != program.scene_format {
            return Err(LightShaftsError::InvalidCommandList(format!(
                "scene color is {:?}, program composites into {:?}",
                scene_color.format(),
                program.scene_format
            )));
        }

        // Validation errors must come back as values, not reach the uncaptured handler.
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let recorded = self.record(program, descriptor.precision, commands, scene_color);
        let captured = pollster::block_on(self.device.pop_error_scope());
        let command_buffer = match (recorded, captured) {
            (_, Some(err)) => return Err(LightShaftsError::Validation(err.to_string())),
            (Err(err), None) => return Err(err),
            (Ok(command_buffer), None) => command_buffer,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.queue.submit(std::iter::once(command_buffer));
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(LightShaftsError::Validation(err.to_string())),
            None => Ok(()),
        }
    }
}

impl WgpuBackend {
    /// Upload the frame's uniforms and encode `commands` into one command buffer.
    fn record(
        &self,
        program: &LightShaftsProgram,
        precision: ColorPrecision,
        commands: &CommandList,
        scene_color: &RenderTarget,
    ) -> Result<wgpu::CommandBuffer> {
        let resolve = |id: TargetId| resolve_target(&self.targets, scene_color, id);

        self.queue
            .write_buffer(&program.params_buffer, 0, bytemuck::bytes_of(&self.params));
        let mut step = KawaseStepParams::default();
        self.queue
            .write_buffer(&program.step_buffers[0], 0, bytemuck::bytes_of(&step));

        let jitter_view = self.jitter_view();
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Light Shafts Encoder"),
        });

        let mut step_slot = 0usize;
        for command in commands.commands() {
            match command {
                FilterCommand::BeginScope(name) => encoder.push_debug_group(name),
                FilterCommand::EndScope => encoder.pop_debug_group(),
                FilterCommand::Clear { target, color } => {
                    let target_rt = resolve(*target)?;
                    check_usage(*target, target_rt, wgpu::TextureUsages::RENDER_ATTACHMENT)?;
                    clear_target(&mut encoder, &target_rt.color_view, *color);
                }
                FilterCommand::SetGlobalFloat { name, value } => {
                    step_slot += 1;
                    let buffer = program.step_buffers.get(step_slot).ok_or_else(|| {
                        LightShaftsError::InvalidCommandList("too many step radius updates".into())
                    })?;
                    if !program.uniform_table.write_step_f32(*name, *value, &mut step) {
                        return Err(LightShaftsError::InvalidCommandList(format!(
                            "{} cannot change within a frame",
                            name.shader_name()
                        )));
                    }
                    self.queue.write_buffer(buffer, 0, bytemuck::bytes_of(&step));
                }
                FilterCommand::Blit { src, dst, pass } => {
                    let source = resolve(*src)?;
                    let destination = resolve(*dst)?;

                    if pass.is_none() && texel_copy_allowed(source, destination) {
                        copy_target(
                            &mut encoder,
                            &source.color_texture,
                            &destination.color_texture,
                            destination.width,
                            destination.height,
                        );
                        continue;
                    }
                    check_usage(*src, source, wgpu::TextureUsages::TEXTURE_BINDING)?;
                    check_usage(*dst, destination, wgpu::TextureUsages::RENDER_ATTACHMENT)?;

                    let pipeline = match pass {
                        Some(p) => program.pipeline(*p, precision),
                        None if dst.is_working_buffer() => &program.working(precision).copy,
                        None => {
                            return Err(LightShaftsError::InvalidCommandList(format!(
                                "resampling copy into {dst:?} is not supported"
                            )))
                        }
                    };

                    let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Light Shafts BG"),
                        layout: &program.bind_group_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: PARAMS_BINDING,
                                resource: program.params_buffer.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: SOURCE_TEXTURE_BINDING,
                                resource: wgpu::BindingResource::TextureView(&source.color_view),
                            },
                            wgpu::BindGroupEntry {
                                binding: SAMPLER_BINDING,
                                resource: wgpu::BindingResource::Sampler(&program.linear_sampler),
                            },
                            wgpu::BindGroupEntry {
                                binding: JITTER_TEXTURE_BINDING,
                                resource: wgpu::BindingResource::TextureView(jitter_view),
                            },
                            wgpu::BindGroupEntry {
                                binding: KAWASE_STEP_BINDING,
                                resource: program.step_buffers[step_slot].as_entire_binding(),
                            },
                        ],
                    });

                    // Composite blends onto the scene; working buffers are fully overwritten.
                    let load = if *pass == Some(SubPass::Composite) || !dst.is_working_buffer() {
                        wgpu::LoadOp::Load
                    } else {
                        wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                    };
                    let label = match pass {
                        Some(p) => p.entry_point(),
                        None => "fs_copy",
                    };
                    render_fullscreen_blit(&mut encoder, &destination.color_view, pipeline, &bind_group, load, label);
                }
            }
        }

        Ok(encoder.finish())
    }
}

/// A plain blit can be a texel copy when both targets share size and format
/// and carry the copy usages; otherwise it goes through the `fs_copy` pipeline.
pub fn texel_copy_allowed(source: &RenderTarget, destination: &RenderTarget) -> bool {
    source.width == destination.width
        && source.height == destination.height
        && source.format() == destination.format()
        && source.usage().contains(wgpu::TextureUsages::COPY_SRC)
        && destination.usage().contains(wgpu::TextureUsages::COPY_DST)
}

fn check_sampleable(texture: &wgpu::Texture, features: wgpu::Features) -> Result<()> {
    let unsupported = |reason: String| Err(LightShaftsError::UnsupportedTexture(reason));
    if !texture.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING) {
        return unsupported(format!("usage {:?} lacks TEXTURE_BINDING", texture.usage()));
    }
    if texture.dimension() != wgpu::TextureDimension::D2 || texture.sample_count() != 1 {
        return unsupported(format!(
            "{:?} texture with {} samples",
            texture.dimension(),
            texture.sample_count()
        ));
    }
    match texture.format().sample_type(None, Some(features)) {
        Some(wgpu::TextureSampleType::Float { filterable: true }) => Ok(()),
        _ => unsupported(format!("{:?} is not a filterable float format", texture.format())),
    }
}

fn check_usage(id: TargetId, target: &RenderTarget, required: wgpu::TextureUsages) -> Result<()> {
    if target.usage().contains(required) {
        Ok(())
    } else {
        Err(LightShaftsError::InvalidCommandList(format!(
            "{} needs {required:?}, has {:?}",
            id.label(),
            target.usage()
        )))
    }
}

fn resolve_target<'a>(
    targets: &'a TargetPool<RenderTarget>,
    scene_color: &'a RenderTarget,
    id: TargetId,
) -> Result<&'a RenderTarget> {
    match id {
        TargetId::SceneColor => Ok(scene_color),
        _ => targets.get(id).ok_or(LightShaftsError::MissingTarget(id)),
    }
}
