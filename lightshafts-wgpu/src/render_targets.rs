//! Working buffer sizing and the pool that hands out the two ping-pong targets.

use std::collections::HashMap;

use crate::error::{LightShaftsError, Result};

/// Extended-range float color format for working buffers.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Reduced precision color format. wgpu exposes no renderable 565 format, so
/// the 8-bit unorm format stands in for it.
pub const LDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Color precision of the working buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorPrecision {
    /// RGB565-class storage. Cheap, clamps to [0, 1].
    Reduced,
    /// Float storage that keeps HDR values.
    ExtendedFloat,
}

impl ColorPrecision {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            ColorPrecision::Reduced => LDR_FORMAT,
            ColorPrecision::ExtendedFloat => HDR_FORMAT,
        }
    }
}

/// Stable identifiers for the targets the light shafts pipeline touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetId {
    /// Host-owned camera color target.
    SceneColor,
    /// Canonical "current result" working buffer.
    BufferA,
    /// Scratch working buffer.
    BufferB,
}

impl TargetId {
    pub const WORKING: [TargetId; 2] = [TargetId::BufferA, TargetId::BufferB];

    pub fn label(self) -> &'static str {
        match self {
            TargetId::SceneColor => "Scene Color",
            TargetId::BufferA => "VolumetricLightShaftsPass Buffer A",
            TargetId::BufferB => "VolumetricLightShaftsPass Buffer B",
        }
    }

    pub fn is_working_buffer(self) -> bool {
        !matches!(self, TargetId::SceneColor)
    }
}

/// Description of one working buffer. Working buffers are always sampled bilinearly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkingBufferDescriptor {
    pub width: u32,
    pub height: u32,
    pub precision: ColorPrecision,
    pub depth_buffer_bits: u32,
}

impl WorkingBufferDescriptor {
    /// Base resolution halved `downsamples` times (floor division).
    pub fn for_camera(base_width: u32, base_height: u32, downsamples: u32, precision: ColorPrecision) -> Self {
        Self {
            width: downsample_extent(base_width, downsamples),
            height: downsample_extent(base_height, downsamples),
            precision,
            depth_buffer_bits: 0,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.precision.texture_format()
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Checks the descriptor against the device's texture limits.
    pub fn check(&self, target: TargetId, max_dimension: u32) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LightShaftsError::allocation(
                target,
                format!("zero-sized target {}x{}", self.width, self.height),
            ));
        }
        if self.width > max_dimension || self.height > max_dimension {
            return Err(LightShaftsError::allocation(
                target,
                format!(
                    "{}x{} exceeds max texture dimension {max_dimension}",
                    self.width, self.height
                ),
            ));
        }
        Ok(())
    }
}

/// `extent / 2^downsamples`, saturating to 0 for oversized shifts.
pub fn downsample_extent(extent: u32, downsamples: u32) -> u32 {
    extent.checked_shr(downsamples).unwrap_or(0)
}

struct PoolEntry<T> {
    descriptor: WorkingBufferDescriptor,
    target: T,
    in_use: bool,
}

/// Temporary target pool keyed by stable identifiers.
///
/// Released targets stay cached and are handed back by the next `acquire` with
/// an identical descriptor; a different descriptor replaces the cached target.
pub struct TargetPool<T> {
    entries: HashMap<TargetId, PoolEntry<T>>,
    allocations: u64,
}

impl<T> TargetPool<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            allocations: 0,
        }
    }

    pub fn acquire_with<F>(&mut self, id: TargetId, descriptor: &WorkingBufferDescriptor, allocate: F) -> Result<&T>
    where
        F: FnOnce(&WorkingBufferDescriptor) -> Result<T>,
    {
        let reusable = matches!(self.entries.get(&id), Some(e) if e.descriptor == *descriptor);
        if !reusable {
            // Drop any stale target before allocating its replacement.
            self.entries.remove(&id);
            let target = allocate(descriptor)?;
            self.allocations += 1;
            log::debug!(
                "allocated {} {}x{} {:?}",
                id.label(),
                descriptor.width,
                descriptor.height,
                descriptor.precision
            );
            self.entries.insert(
                id,
                PoolEntry {
                    descriptor: *descriptor,
                    target,
                    in_use: false,
                },
            );
        }

        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(LightShaftsError::MissingTarget(id))?;
        entry.in_use = true;
        Ok(&entry.target)
    }

    /// Returns a target to the pool. Releasing an unknown or free id is a no-op.
    pub fn release(&mut self, id: TargetId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) if entry.in_use => {
                entry.in_use = false;
                true
            }
            _ => false,
        }
    }

    /// Target currently checked out under `id`.
    pub fn get(&self, id: TargetId) -> Option<&T> {
        self.entries.get(&id).filter(|e| e.in_use).map(|e| &e.target)
    }

    pub fn is_in_use(&self, id: TargetId) -> bool {
        self.get(id).is_some()
    }

    pub fn in_use_count(&self) -> usize {
        self.entries.values().filter(|e| e.in_use).count()
    }

    /// Number of real allocations performed so far.
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    /// Drops every cached target that is not checked out.
    pub fn trim(&mut self) {
        self.entries.retain(|_, e| e.in_use);
    }
}

impl<T> Default for TargetPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Color render target: texture plus its default view.
pub struct RenderTarget {
    pub color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    /// Wrap an existing texture (typically the host's scene color target).
    pub fn from_texture(color_texture: wgpu::Texture) -> Self {
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let width = color_texture.width();
        let height = color_texture.height();
        Self {
            color_texture,
            color_view,
            width,
            height,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.color_texture.format()
    }

    pub fn usage(&self) -> wgpu::TextureUsages {
        self.color_texture.usage()
    }
}

/// Create a working buffer for the given descriptor.
pub fn create_working_buffer(
    device: &wgpu::Device,
    descriptor: &WorkingBufferDescriptor,
    label: &str,
) -> RenderTarget {
    let color_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: descriptor.extent(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: descriptor.format(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    RenderTarget::from_texture(color_texture)
}

/// Create a 1x1 texture with the given RGBA8 value, bound when no jitter texture is set.
pub fn create_default_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    rgba: [u8; 4],
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Light Shafts Default 1x1"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(width: u32, height: u32) -> WorkingBufferDescriptor {
        WorkingBufferDescriptor::for_camera(width, height, 0, ColorPrecision::ExtendedFloat)
    }

    #[test]
    fn descriptor_halves_per_downsample() {
        let d = WorkingBufferDescriptor::for_camera(512, 512, 1, ColorPrecision::Reduced);
        assert_eq!((d.width, d.height), (256, 256));
        let d = WorkingBufferDescriptor::for_camera(1921, 1081, 3, ColorPrecision::Reduced);
        assert_eq!((d.width, d.height), (240, 135));
        assert_eq!(d.depth_buffer_bits, 0);
    }

    #[test]
    fn oversized_shift_saturates_to_zero() {
        assert_eq!(downsample_extent(4096, 32), 0);
        assert_eq!(downsample_extent(4096, u32::MAX), 0);
        assert_eq!(downsample_extent(3, 2), 0);
    }

    #[test]
    fn precision_picks_exactly_one_format() {
        assert_eq!(ColorPrecision::Reduced.texture_format(), LDR_FORMAT);
        assert_eq!(ColorPrecision::ExtendedFloat.texture_format(), HDR_FORMAT);
        assert_ne!(LDR_FORMAT, HDR_FORMAT);
    }

    #[test]
    fn check_rejects_zero_and_oversized_targets() {
        assert!(desc(0, 16).check(TargetId::BufferA, 8192).is_err());
        assert!(desc(16, 9000).check(TargetId::BufferB, 8192).is_err());
        assert!(desc(16, 16).check(TargetId::BufferA, 8192).is_ok());
    }

    #[test]
    fn pool_reuses_matching_descriptor() {
        let mut pool = TargetPool::new();
        let d = desc(64, 64);
        assert_eq!(*pool.acquire_with(TargetId::BufferA, &d, |_| Ok(1)).unwrap(), 1);
        assert!(pool.release(TargetId::BufferA));
        assert_eq!(*pool.acquire_with(TargetId::BufferA, &d, |_| Ok(2)).unwrap(), 1);
        assert_eq!(pool.allocation_count(), 1);

        pool.release(TargetId::BufferA);
        let bigger = desc(128, 128);
        assert_eq!(*pool.acquire_with(TargetId::BufferA, &bigger, |_| Ok(3)).unwrap(), 3);
        assert_eq!(pool.allocation_count(), 2);
    }

    #[test]
    fn pool_tracks_checked_out_targets() {
        let mut pool = TargetPool::new();
        let d = desc(8, 8);
        pool.acquire_with(TargetId::BufferA, &d, |_| Ok(())).unwrap();
        pool.acquire_with(TargetId::BufferB, &d, |_| Ok(())).unwrap();
        assert_eq!(pool.in_use_count(), 2);
        assert!(pool.release(TargetId::BufferA));
        assert!(!pool.release(TargetId::BufferA));
        assert!(!pool.release(TargetId::SceneColor));
        assert_eq!(pool.in_use_count(), 1);
        pool.trim();
        assert!(pool.get(TargetId::BufferA).is_none());
        assert!(pool.is_in_use(TargetId::BufferB));
    }

    #[test]
    fn failed_allocation_leaves_nothing_checked_out() {
        let mut pool: TargetPool<u32> = TargetPool::new();
        let err = pool
            .acquire_with(TargetId::BufferB, &desc(8, 8), |_| {
                Err(LightShaftsError::allocation(TargetId::BufferB, "out of memory"))
            })
            .unwrap_err();
        assert!(matches!(err, LightShaftsError::Allocation { .. }));
        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.allocation_count(), 0);
    }
}
