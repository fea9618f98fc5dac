mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};

use common::{camera, Event, MockBackend};
use lightshafts_wgpu::pipeline::ADDITIVE_BLEND;
use lightshafts_wgpu::{
    ColorPrecision, FramePhase, FrameOutcome, LightShaftsError, LightShaftsFeature, LightShaftsSettings,
    ProgramState, RenderPassEvent, TargetId, TextureHandle, UniformName,
};

fn settings(downsamples: u32, extra_blur: bool) -> LightShaftsSettings {
    LightShaftsSettings {
        downsamples,
        use_additional_blurring: extra_blur,
        ..Default::default()
    }
}

// ── Full frames ──────────────────────────────────────────────────

#[test]
fn downsampled_frame_without_extra_blur() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);

    let buffers = feature.setup(&camera(512, 512), &settings(1, false)).unwrap();
    assert_eq!((buffers.descriptor.width, buffers.descriptor.height), (256, 256));
    assert_eq!(buffers.buffer_a, TargetId::BufferA);
    assert_eq!(buffers.buffer_b, TargetId::BufferB);
    assert_eq!(feature.phase(), FramePhase::SetUp);

    assert_eq!(feature.execute(&()).unwrap(), 3);
    assert_eq!(feature.phase(), FramePhase::Executed);
    feature.cleanup();
    assert_eq!(feature.phase(), FramePhase::CleanedUp);

    let s = state.borrow();
    let d = buffers.descriptor;
    assert_eq!(
        s.events,
        vec![
            Event::Load,
            Event::Params,
            Event::Allocate(TargetId::BufferA, d),
            Event::Allocate(TargetId::BufferB, d),
            Event::Submit,
            Event::Release(TargetId::BufferA),
            Event::Release(TargetId::BufferB),
        ]
    );
    assert_eq!(s.submitted.len(), 1);
    assert_eq!(s.submitted[0].filter_op_count(), 3);
    assert!(s.outstanding.is_empty());
}

#[test]
fn extra_blur_frame_runs_thirteen_ops() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);

    assert_eq!(
        feature.run_frame(&camera(512, 512), &settings(0, true), &()),
        FrameOutcome::Composited { filter_ops: 13 }
    );
    let s = state.borrow();
    assert_eq!(
        s.submitted[0].global_floats(UniformName::KawaseBlurStepRadius),
        vec![0.0, 1.0, 2.0, 2.0, 3.0]
    );
    assert!(s.outstanding.is_empty());
}

#[test]
fn precision_flag_selects_working_format() {
    let (backend, _state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);

    let mut s = settings(0, false);
    s.lower_texture_to_16bit = true;
    let buffers = feature.setup(&camera(64, 64), &s).unwrap();
    assert_eq!(buffers.descriptor.precision, ColorPrecision::Reduced);
    feature.cleanup();

    s.lower_texture_to_16bit = false;
    let buffers = feature.setup(&camera(64, 64), &s).unwrap();
    assert_eq!(buffers.descriptor.precision, ColorPrecision::ExtendedFloat);
    assert_eq!(buffers.descriptor.depth_buffer_bits, 0);
    feature.cleanup();
}

#[test]
fn uniforms_carry_settings_and_light_center() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);

    let s = LightShaftsSettings {
        intensity: 0.0,
        use_fixed_length: true,
        ..Default::default()
    };
    feature.setup(&camera(512, 512), &s).unwrap();
    let params = state.borrow().params.unwrap();
    assert_eq!(params.intensity, 0.0);
    assert_eq!(params.use_fixed_length, 1);
    assert!((params.blur_center_uv[0] - 0.5).abs() < 1e-5);
    assert!((params.blur_center_uv[1] - 0.5).abs() < 1e-5);
    assert!(params.blur_center_uv[2] > 0.0);

    let ctx = feature.frame_context().unwrap();
    assert!(ctx.light_position.is_in_front());
    feature.cleanup();
    assert!(feature.frame_context().is_none());
}

#[test]
fn zero_intensity_composite_adds_nothing() {
    // Additive blend: dst' = src + dst, and the composite kernel scales src by intensity.
    assert_eq!(ADDITIVE_BLEND.color.src_factor, wgpu::BlendFactor::One);
    assert_eq!(ADDITIVE_BLEND.color.dst_factor, wgpu::BlendFactor::One);
    assert_eq!(ADDITIVE_BLEND.alpha.src_factor, wgpu::BlendFactor::Zero);
}

#[test]
fn jitter_texture_flag_follows_registration() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);
    let handle = TextureHandle(7);
    let s = LightShaftsSettings {
        jitter_texture: Some(handle),
        jitter_factor: 0.5,
        ..Default::default()
    };

    feature.setup(&camera(64, 64), &s).unwrap();
    assert_eq!(state.borrow().params.unwrap().has_jitter_texture, 0);
    feature.cleanup();

    state.borrow_mut().registered.insert(handle);
    feature.setup(&camera(64, 64), &s).unwrap();
    assert_eq!(state.borrow().params.unwrap().has_jitter_texture, 1);
    assert_eq!(state.borrow().params.unwrap().jitter_factor, 0.5);
    feature.cleanup();
}

// ── Program state ────────────────────────────────────────────────

#[test]
fn program_loads_once_across_frames() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);
    for _ in 0..4 {
        assert!(matches!(
            feature.run_frame(&camera(128, 128), &settings(2, true), &()),
            FrameOutcome::Composited { .. }
        ));
    }
    assert_eq!(state.borrow().load_calls, 1);
    assert_eq!(feature.program_state(), &ProgramState::Ready);
}

#[test]
fn program_failure_is_sticky_until_reload() {
    let (backend, state) = MockBackend::new();
    state.borrow_mut().fail_load = Some("entry point fs_composite missing".into());
    let mut feature = LightShaftsFeature::new(backend);

    let first = feature.run_frame(&camera(64, 64), &settings(0, false), &());
    assert!(matches!(first, FrameOutcome::Skipped(LightShaftsError::Configuration(_))));
    assert!(matches!(feature.program_state(), ProgramState::Failed(_)));

    let second = feature.run_frame(&camera(64, 64), &settings(0, false), &());
    assert_eq!(second, FrameOutcome::Skipped(LightShaftsError::ProgramUnavailable));
    assert_eq!(state.borrow().load_calls, 1);
    assert!(state.borrow().submitted.is_empty());

    state.borrow_mut().fail_load = None;
    feature.reload_program();
    assert_eq!(
        feature.run_frame(&camera(64, 64), &settings(0, false), &()),
        FrameOutcome::Composited { filter_ops: 3 }
    );
    assert_eq!(state.borrow().load_calls, 2);
}

// ── Failure paths still release ──────────────────────────────────

#[test]
fn missing_directional_light_skips_without_allocating() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);
    let mut cam = camera(64, 64);
    cam.sun = None;

    assert_eq!(
        feature.run_frame(&cam, &settings(0, false), &()),
        FrameOutcome::Skipped(LightShaftsError::NoDirectionalLight)
    );
    let s = state.borrow();
    assert!(!s.events.iter().any(|e| matches!(e, Event::Allocate(..))));
    assert!(s.submitted.is_empty());
}

#[test]
fn failed_second_allocation_releases_the_first() {
    let (backend, state) = MockBackend::new();
    state.borrow_mut().fail_allocate = Some(TargetId::BufferB);
    let mut feature = LightShaftsFeature::new(backend);

    let err = feature.setup(&camera(64, 64), &settings(0, false)).unwrap_err();
    assert!(matches!(err, LightShaftsError::Allocation { target: TargetId::BufferB, .. }));
    assert_eq!(feature.phase(), FramePhase::SetupFailed);
    assert_eq!(feature.allocated_targets(), &[TargetId::BufferA]);
    assert!(matches!(feature.execute(&()), Err(LightShaftsError::InvalidPhase { .. })));

    feature.cleanup();
    let s = state.borrow();
    assert_eq!(s.releases(), vec![TargetId::BufferA]);
    assert!(s.outstanding.is_empty());
}

#[test]
fn zero_sized_working_buffer_is_an_allocation_error() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);

    let outcome = feature.run_frame(&camera(8, 8), &settings(4, false), &());
    assert!(matches!(
        outcome,
        FrameOutcome::Skipped(LightShaftsError::Allocation { target: TargetId::BufferA, .. })
    ));
    assert!(state.borrow().outstanding.is_empty());

    // The next frame allocates fresh.
    assert_eq!(
        feature.run_frame(&camera(8, 8), &settings(1, false), &()),
        FrameOutcome::Composited { filter_ops: 3 }
    );
}

#[test]
fn failed_submit_still_releases_and_recycles_the_list() {
    let (backend, state) = MockBackend::new();
    state.borrow_mut().fail_submit = true;
    let mut feature = LightShaftsFeature::new(backend);

    let outcome = feature.run_frame(&camera(64, 64), &settings(0, true), &());
    assert!(matches!(outcome, FrameOutcome::Skipped(LightShaftsError::InvalidCommandList(_))));
    assert!(state.borrow().outstanding.is_empty());
    assert_eq!(feature.command_list_pool().available(), 1);
}

#[test]
fn panic_during_execute_still_cleans_up() {
    let (backend, state) = MockBackend::new();
    state.borrow_mut().panic_on_submit = true;
    let mut feature = LightShaftsFeature::new(backend);

    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut frame = feature.begin_frame(&camera(64, 64), &settings(0, false)).unwrap();
        let _ = frame.execute(&());
    }));
    assert!(result.is_err());

    let s = state.borrow();
    assert_eq!(s.releases(), vec![TargetId::BufferA, TargetId::BufferB]);
    assert!(s.outstanding.is_empty());
    drop(s);
    assert!(feature.allocated_targets().is_empty());
    assert_eq!(feature.command_list_pool().available(), 1);
}

#[test]
fn skipped_execute_is_matched_by_cleanup() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);

    {
        let frame = feature.begin_frame(&camera(64, 64), &settings(0, false)).unwrap();
        assert_eq!(frame.buffers().buffer_a, TargetId::BufferA);
        // Host disables the camera: no execute.
    }
    let s = state.borrow();
    assert!(s.submitted.is_empty());
    assert_eq!(s.releases(), vec![TargetId::BufferA, TargetId::BufferB]);
}

#[test]
fn dropping_the_feature_releases_outstanding_buffers() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);
    feature.setup(&camera(64, 64), &settings(0, false)).unwrap();
    drop(feature);
    assert!(state.borrow().outstanding.is_empty());
}

// ── Lifecycle misuse ─────────────────────────────────────────────

#[test]
fn execute_before_setup_is_rejected() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);
    assert_eq!(
        feature.execute(&()),
        Err(LightShaftsError::InvalidPhase {
            operation: "execute",
            phase: "Idle"
        })
    );
    assert!(state.borrow().submitted.is_empty());
}

#[test]
fn execute_twice_is_rejected() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);
    feature.setup(&camera(64, 64), &settings(0, false)).unwrap();
    feature.execute(&()).unwrap();
    assert!(feature.execute(&()).is_err());
    feature.cleanup();
    assert_eq!(state.borrow().submitted.len(), 1);
}

#[test]
fn setup_without_cleanup_releases_previous_frame_first() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);
    feature.setup(&camera(64, 64), &settings(0, false)).unwrap();
    feature.setup(&camera(64, 64), &settings(0, false)).unwrap();
    assert_eq!(state.borrow().releases(), vec![TargetId::BufferA, TargetId::BufferB]);
    assert_eq!(feature.allocated_targets().len(), 2);
    feature.cleanup();
    assert!(state.borrow().outstanding.is_empty());
}

#[test]
fn cleanup_is_idempotent() {
    let (backend, state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);
    feature.setup(&camera(64, 64), &settings(0, false)).unwrap();
    feature.cleanup();
    feature.cleanup();
    assert_eq!(state.borrow().releases().len(), 2);
}

#[test]
fn command_list_is_returned_cleared() {
    let (backend, _state) = MockBackend::new();
    let mut feature = LightShaftsFeature::new(backend);
    feature.run_frame(&camera(64, 64), &settings(0, true), &());
    feature.run_frame(&camera(64, 64), &settings(0, false), &());
    assert_eq!(feature.command_list_pool().available(), 1);
}

#[test]
fn default_injection_point_is_after_transparents() {
    let (backend, _state) = MockBackend::new();
    let feature = LightShaftsFeature::new(backend);
    assert_eq!(feature.render_pass_event(), RenderPassEvent::AfterRenderingTransparents);
    let feature = feature.with_render_pass_event(RenderPassEvent::BeforeRenderingPostProcessing);
    assert_eq!(feature.render_pass_event(), RenderPassEvent::BeforeRenderingPostProcessing);
}
