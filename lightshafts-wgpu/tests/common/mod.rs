#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use lightshafts_wgpu::{
    CameraState, CommandList, DirectionalLight, LightShaftsError, LightShaftsParams, ShaftsBackend, TargetId,
    TextureHandle, WorkingBufferDescriptor,
};

/// Route `log` output through the test harness; set RUST_LOG to see it.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Load,
    Params,
    Allocate(TargetId, WorkingBufferDescriptor),
    Release(TargetId),
    Submit,
}

#[derive(Default)]
pub struct MockState {
    pub events: Vec<Event>,
    pub load_calls: usize,
    pub fail_load: Option<String>,
    pub fail_allocate: Option<TargetId>,
    pub fail_submit: bool,
    pub panic_on_submit: bool,
    pub outstanding: HashSet<TargetId>,
    pub registered: HashSet<TextureHandle>,
    pub params: Option<LightShaftsParams>,
    pub submitted: Vec<CommandList>,
}

impl MockState {
    pub fn releases(&self) -> Vec<TargetId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Release(id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

/// Records every backend call; state is shared so tests can inspect it after
/// the feature (and the backend it owns) is gone.
#[derive(Clone, Default)]
pub struct MockBackend {
    pub state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    pub fn new() -> (Self, Rc<RefCell<MockState>>) {
        init_logging();
        let backend = Self::default();
        let state = Rc::clone(&backend.state);
        (backend, state)
    }
}

impl ShaftsBackend for MockBackend {
    type SceneColor = ();

    fn load_program(&mut self) -> Result<(), LightShaftsError> {
        let mut s = self.state.borrow_mut();
        s.load_calls += 1;
        s.events.push(Event::Load);
        match &s.fail_load {
            Some(msg) => Err(LightShaftsError::Configuration(msg.clone())),
            None => Ok(()),
        }
    }

    fn allocate_target(&mut self, id: TargetId, descriptor: &WorkingBufferDescriptor) -> Result<(), LightShaftsError> {
        let mut s = self.state.borrow_mut();
        if s.fail_allocate == Some(id) {
            return Err(LightShaftsError::allocation(id, "unsupported format"));
        }
        descriptor.check(id, 8192)?;
        s.events.push(Event::Allocate(id, *descriptor));
        s.outstanding.insert(id);
        Ok(())
    }

    fn release_target(&mut self, id: TargetId) {
        let mut s = self.state.borrow_mut();
        s.events.push(Event::Release(id));
        s.outstanding.remove(&id);
    }

    fn set_jitter_texture(&mut self, handle: Option<TextureHandle>) -> bool {
        handle.map_or(false, |h| self.state.borrow().registered.contains(&h))
    }

    fn write_params(&mut self, params: &LightShaftsParams) {
        let mut s = self.state.borrow_mut();
        s.events.push(Event::Params);
        s.params = Some(*params);
    }

    fn submit(&mut self, commands: &CommandList, _scene_color: &()) -> Result<(), LightShaftsError> {
        let mut s = self.state.borrow_mut();
        s.events.push(Event::Submit);
        s.submitted.push(commands.clone());
        if s.panic_on_submit {
            drop(s);
            panic!("device lost while recording");
        }
        if s.fail_submit {
            return Err(LightShaftsError::InvalidCommandList("rejected by mock".into()));
        }
        Ok(())
    }
}

/// Camera at the origin looking down +Z with the sun shining the same way.
pub fn camera(width: u32, height: u32) -> CameraState {
    CameraState {
        position: Vec3::ZERO,
        view: Mat4::look_to_lh(Vec3::ZERO, Vec3::Z, Vec3::Y),
        projection: Mat4::perspective_lh(60f32.to_radians(), width as f32 / height as f32, 0.1, 100.0),
        width,
        height,
        sun: Some(DirectionalLight { forward: Vec3::Z }),
    }
}
