//! Screen-space volumetric light shafts ("god rays") for wgpu renderers.
//!
//! Each camera owns a [`LightShaftsFeature`]. Per frame the host calls
//! `setup`, `execute` and `cleanup` (or `run_frame`, which contains every
//! error). The filter sequence is recorded as a backend-neutral
//! [`CommandList`] and submitted once through a [`ShaftsBackend`];
//! [`WgpuBackend`] is the wgpu implementation.

pub mod backend;
pub mod command_list;
pub mod error;
pub mod feature;
pub mod handle;
pub mod passes;
pub mod pipeline;
pub mod projector;
pub mod render_targets;
pub mod settings;
pub mod uniform_table;

pub use backend::{ShaftsBackend, WgpuBackend};
pub use command_list::{CommandList, CommandListPool, FilterCommand, PooledCommandList};
pub use error::{LightShaftsError, Result};
pub use feature::{
    ActiveFrame, FrameContext, FrameOutcome, FramePhase, LightShaftsFeature, ProgramState, RenderPassEvent,
    WorkingBuffers,
};
pub use handle::TextureHandle;
pub use lightshafts_gpu_shared::uniforms::{LightShaftsParams, SubPass};
pub use passes::light_shafts::{build_filter_commands, KAWASE_BLUR_RADII};
pub use projector::{project_light, CameraState, DirectionalLight, LightScreenPosition};
pub use render_targets::{ColorPrecision, RenderTarget, TargetId, WorkingBufferDescriptor};
pub use settings::LightShaftsSettings;
pub use uniform_table::{UniformName, UniformTable};
