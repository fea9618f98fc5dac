//! Per-camera lifecycle of the light shafts effect: Setup, Execute, Cleanup.

use crate::backend::ShaftsBackend;
use crate::command_list::CommandListPool;
use crate::error::{LightShaftsError, Result};
use crate::passes::light_shafts::build_filter_commands;
use crate::projector::{project_light, CameraState, LightScreenPosition};
use crate::render_targets::{TargetId, WorkingBufferDescriptor};
use crate::settings::LightShaftsSettings;
use crate::uniform_table::pack_params;

/// Where in the host's frame the effect expects to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderPassEvent {
    BeforeRenderingTransparents,
    #[default]
    AfterRenderingTransparents,
    BeforeRenderingPostProcessing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramState {
    Uninitialized,
    Ready,
    /// Load failed; stays failed until `reload_program` is called.
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    SetUp,
    /// Setup returned an error. Execute is refused, Cleanup is still required.
    SetupFailed,
    Executed,
    CleanedUp,
}

impl FramePhase {
    pub fn name(self) -> &'static str {
        match self {
            FramePhase::Idle => "Idle",
            FramePhase::SetUp => "SetUp",
            FramePhase::SetupFailed => "SetupFailed",
            FramePhase::Executed => "Executed",
            FramePhase::CleanedUp => "CleanedUp",
        }
    }

    fn accepts_setup(self) -> bool {
        matches!(self, FramePhase::Idle | FramePhase::CleanedUp)
    }
}

/// Handles to the working buffers of the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkingBuffers {
    pub buffer_a: TargetId,
    pub buffer_b: TargetId,
    pub descriptor: WorkingBufferDescriptor,
}

/// Values derived during Setup, valid until Cleanup.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameContext {
    pub light_position: LightScreenPosition,
    pub descriptor: WorkingBufferDescriptor,
    pub settings: LightShaftsSettings,
}

/// Result of a contained frame run.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Composited { filter_ops: usize },
    Skipped(LightShaftsError),
}

/// Light shafts effect for one camera.
///
/// The host calls `setup`, `execute` and `cleanup` once per frame, in that
/// order. `cleanup` must follow every `setup`, including failed ones;
/// [`LightShaftsFeature::begin_frame`] returns a guard that does this on drop.
pub struct LightShaftsFeature<B: ShaftsBackend> {
    backend: B,
    program: ProgramState,
    phase: FramePhase,
    allocated: Vec<TargetId>,
    pending_clear: Option<TargetId>,
    frame: Option<FrameContext>,
    command_lists: CommandListPool,
    render_pass_event: RenderPassEvent,
}

impl<B: ShaftsBackend> LightShaftsFeature<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            program: ProgramState::Uninitialized,
            phase: FramePhase::Idle,
            allocated: Vec::with_capacity(TargetId::WORKING.len()),
            pending_clear: None,
            frame: None,
            command_lists: CommandListPool::new(),
            render_pass_event: RenderPassEvent::default(),
        }
    }

    pub fn with_render_pass_event(mut self, event: RenderPassEvent) -> Self {
        self.render_pass_event = event;
        self
    }

    pub fn render_pass_event(&self) -> RenderPassEvent {
        self.render_pass_event
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn program_state(&self) -> &ProgramState {
        &self.program
    }

    pub fn frame_context(&self) -> Option<&FrameContext> {
        self.frame.as_ref()
    }

    /// Working buffers currently held from the pool.
    pub fn allocated_targets(&self) -> &[TargetId] {
        &self.allocated
    }

    pub fn command_list_pool(&self) -> &CommandListPool {
        &self.command_lists
    }

    /// Forget a failed or stale program; the next Setup loads it again.
    pub fn reload_program(&mut self) {
        self.program = ProgramState::Uninitialized;
    }

    fn ensure_program(&mut self) -> Result<()> {
        match self.program {
            ProgramState::Ready => Ok(()),
            ProgramState::Failed(_) => Err(LightShaftsError::ProgramUnavailable),
            ProgramState::Uninitialized => match self.backend.load_program() {
                Ok(()) => {
                    self.program = ProgramState::Ready;
                    Ok(())
                }
                Err(err) => {
                    log::error!("{err}; light shafts disabled until the program is reloaded");
                    self.program = ProgramState::Failed(err.to_string());
                    Err(err)
                }
            },
        }
    }

    /// Setup phase: load the program on first use, upload uniforms, project the
    /// light and check out both working buffers.
    pub fn setup(&mut self, camera: &CameraState, settings: &LightShaftsSettings) -> Result<WorkingBuffers> {
        if !self.phase.accepts_setup() {
            log::warn!("setup called in phase {}; cleaning up the previous frame", self.phase.name());
            self.cleanup();
        }
        self.phase = FramePhase::SetupFailed;

        self.ensure_program()?;

        let settings = settings.get();
        let light_position = project_light(camera)?;
        let has_jitter = self.backend.set_jitter_texture(settings.jitter_texture);
        self.backend
            .write_params(&pack_params(settings, light_position, has_jitter));

        let descriptor = WorkingBufferDescriptor::for_camera(
            camera.width,
            camera.height,
            settings.downsamples,
            settings.color_precision(),
        );
        for id in TargetId::WORKING {
            self.backend.allocate_target(id, &descriptor)?;
            self.allocated.push(id);
        }

        self.pending_clear = Some(TargetId::BufferA);
        self.frame = Some(FrameContext {
            light_position,
            descriptor,
            settings: settings.clone(),
        });
        self.phase = FramePhase::SetUp;

        Ok(WorkingBuffers {
            buffer_a: TargetId::BufferA,
            buffer_b: TargetId::BufferB,
            descriptor,
        })
    }

    /// Execute phase: record the filter sequence and submit it once.
    /// Returns the number of filter operations submitted.
    pub fn execute(&mut self, scene_color: &B::SceneColor) -> Result<usize> {
        if self.phase != FramePhase::SetUp {
            return Err(LightShaftsError::InvalidPhase {
                operation: "execute",
                phase: self.phase.name(),
            });
        }
        let frame = self.frame.as_ref().ok_or(LightShaftsError::InvalidPhase {
            operation: "execute",
            phase: self.phase.name(),
        })?;

        let mut list = self.command_lists.checkout();
        build_filter_commands(&frame.settings, self.pending_clear.take(), &mut list);
        let filter_ops = list.filter_op_count();
        log::trace!("light shafts: {} commands, {filter_ops} filter ops", list.len());

        let submitted = self.backend.submit(&list, scene_color);
        drop(list);
        self.phase = FramePhase::Executed;

        submitted.map(|()| filter_ops)
    }

    /// Cleanup phase: release every working buffer checked out by Setup.
    /// Safe to call in any phase and more than once.
    pub fn cleanup(&mut self) {
        for id in self.allocated.drain(..) {
            self.backend.release_target(id);
        }
        self.pending_clear = None;
        self.frame = None;
        self.phase = FramePhase::CleanedUp;
    }

    /// Run Setup and hand back a guard that runs Cleanup when dropped.
    /// A failed Setup is cleaned up before the error is returned.
    pub fn begin_frame(&mut self, camera: &CameraState, settings: &LightShaftsSettings) -> Result<ActiveFrame<'_, B>> {
        match self.setup(camera, settings) {
            Ok(buffers) => Ok(ActiveFrame { feature: self, buffers }),
            Err(err) => {
                self.cleanup();
                Err(err)
            }
        }
    }

    /// All three phases with errors contained: nothing escapes to the caller
    /// beyond the returned outcome.
    pub fn run_frame(
        &mut self,
        camera: &CameraState,
        settings: &LightShaftsSettings,
        scene_color: &B::SceneColor,
    ) -> FrameOutcome {
        let outcome = match self.begin_frame(camera, settings) {
            Ok(mut frame) => frame.execute(scene_color),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(filter_ops) => FrameOutcome::Composited { filter_ops },
            Err(err) => {
                match &err {
                    // Already reported once when the program failed to load.
                    LightShaftsError::Configuration(_) | LightShaftsError::ProgramUnavailable => {
                        log::trace!("light shafts skipped: {err}")
                    }
                    _ => log::warn!("light shafts frame skipped: {err}"),
                }
                FrameOutcome::Skipped(err)
            }
        }
    }
}

impl<B: ShaftsBackend> Drop for LightShaftsFeature<B> {
    fn drop(&mut self) {
        if !self.allocated.is_empty() {
            self.cleanup();
        }
    }
}

/// A frame between Setup and Cleanup. Dropping it runs Cleanup.
pub struct ActiveFrame<'a, B: ShaftsBackend> {
    feature: &'a mut LightShaftsFeature<B>,
    buffers: WorkingBuffers,
}

impl<B: ShaftsBackend> ActiveFrame<'_, B> {
    pub fn buffers(&self) -> &WorkingBuffers {
        &self.buffers
    }

    pub fn execute(&mut self, scene_color: &B::SceneColor) -> Result<usize> {
        self.feature.execute(scene_color)
    }
}

impl<B: ShaftsBackend> Drop for ActiveFrame<'_, B> {
    fn drop(&mut self) {
        self.feature.cleanup();
    }
}
