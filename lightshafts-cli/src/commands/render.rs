use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use lightshafts_wgpu::{FrameOutcome, LightShaftsFeature, RenderTarget, WgpuBackend};

use crate::cli::SettingsArgs;
use crate::scene;

const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct RenderJob {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub sun: [f32; 3],
    pub keep_original: bool,
    pub settings: SettingsArgs,
}

pub fn run(job: RenderJob) -> Result<()> {
    let settings = job.settings.resolve()?;
    if job.width == 0 || job.height == 0 {
        bail!("output size must be non-zero, got {}x{}", job.width, job.height);
    }

    let (device, queue) = create_device()?;
    let camera = scene::camera(job.width, job.height, Vec3::from_array(job.sun));
    let pixels = scene::paint(&camera);
    let target = upload_scene(&device, &queue, job.width, job.height, &pixels);

    if job.keep_original {
        let path = sibling(&job.output, "original");
        save_png(&path, job.width, job.height, pixels)?;
        log::info!("wrote {}", path.display());
    }

    let mut feature = LightShaftsFeature::new(WgpuBackend::new(device.clone(), queue.clone(), SCENE_FORMAT));
    match feature.run_frame(&camera, &settings, &target) {
        FrameOutcome::Composited { filter_ops } => log::info!("light shafts composited ({filter_ops} filter ops)"),
        FrameOutcome::Skipped(err) if err.is_fatal() => return Err(err).context("light shafts failed"),
        FrameOutcome::Skipped(err) => log::warn!("light shafts skipped: {err}; writing the unmodified scene"),
    }

    let result = read_back(&device, &queue, &target)?;
    save_png(&job.output, job.width, job.height, result)?;
    println!("{}", job.output.display());
    Ok(())
}

fn create_device() -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok_or_else(|| anyhow!("no suitable GPU adapter found"))?;
    log::info!("using adapter {:?}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("lsfx Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::default(),
        },
        None,
    ))
    .context("requesting device")?;
    Ok((Arc::new(device), Arc::new(queue)))
}

fn upload_scene(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32, pixels: &[u8]) -> RenderTarget {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("lsfx Scene Color"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SCENE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );
    RenderTarget::from_texture(texture)
}

/// Copy the target into a mappable buffer and strip the row padding.
fn read_back(device: &wgpu::Device, queue: &wgpu::Queue, target: &RenderTarget) -> Result<Vec<u8>> {
    let unpadded = target.width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("lsfx Readback"),
        size: padded as u64 * target.height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("lsfx Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        target.color_texture.as_image_copy(),
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(target.height),
            },
        },
        target.color_texture.size(),
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .context("readback callback dropped")?
        .context("mapping readback buffer")?;

    let mut pixels = Vec::with_capacity((unpadded * target.height) as usize);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
    }
    buffer.unmap();
    Ok(pixels)
}

fn save_png(path: &Path, width: u32, height: u32, pixels: Vec<u8>) -> Result<()> {
    let image = image::RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("pixel buffer does not match {width}x{height}"))?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))
}

/// `out.png` -> `out.original.png`
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("light_shafts");
    path.with_file_name(format!("{stem}.{tag}.png"))
}
