//! Error type for every phase of the light shafts effect.

use crate::render_targets::TargetId;

pub type Result<T, E = LightShaftsError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LightShaftsError {
    /// Shader module or pipeline failed validation. Fatal until the program is reloaded.
    #[error("light shafts program failed to build: {0}")]
    Configuration(String),

    /// A previous program load failed and has not been reloaded since.
    #[error("light shafts program is unavailable")]
    ProgramUnavailable,

    #[error("no directional light is configured")]
    NoDirectionalLight,

    #[error("light direction projects onto the camera plane")]
    DegenerateProjection,

    #[error("failed to allocate {target:?}: {reason}")]
    Allocation { target: TargetId, reason: String },

    #[error("{operation} is not valid in phase {phase}")]
    InvalidPhase { operation: &'static str, phase: &'static str },

    #[error("invalid command list: {0}")]
    InvalidCommandList(String),

    #[error("target {0:?} is not allocated")]
    MissingTarget(TargetId),

    /// The device rejected the recorded commands. Only the current frame is lost.
    #[error("GPU rejected the light shafts commands: {0}")]
    Validation(String),

    #[error("texture cannot be sampled by the light shafts shader: {0}")]
    UnsupportedTexture(String),
}

impl LightShaftsError {
    pub fn allocation<T: ToString>(target: TargetId, reason: T) -> Self {
        LightShaftsError::Allocation {
            target,
            reason: reason.to_string(),
        }
    }

    /// Errors that disable the effect until the host intervenes, as opposed to
    /// errors that only cost the current frame.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LightShaftsError::Configuration(_) | LightShaftsError::ProgramUnavailable
        )
    }
}
