//! Backend-neutral command recording for one frame of the effect.

use std::ops::{Deref, DerefMut};

use lightshafts_gpu_shared::uniforms::SubPass;

use crate::error::{LightShaftsError, Result};
use crate::render_targets::TargetId;
use crate::uniform_table::UniformName;

/// One recorded command. Executed strictly in order.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterCommand {
    BeginScope(&'static str),
    EndScope,
    /// Full clear of a target to the given RGBA color.
    Clear { target: TargetId, color: [f64; 4] },
    SetGlobalFloat { name: UniformName, value: f32 },
    /// `pass: None` is a plain copy (resampling when sizes differ).
    Blit {
        src: TargetId,
        dst: TargetId,
        pass: Option<SubPass>,
    },
}

impl FilterCommand {
    pub fn is_filter_op(&self) -> bool {
        matches!(self, FilterCommand::Blit { .. })
    }
}

/// Ordered command sequence, submitted as a unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<FilterCommand>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: FilterCommand) {
        self.commands.push(command);
    }

    pub fn begin_scope(&mut self, name: &'static str) {
        self.push(FilterCommand::BeginScope(name));
    }

    pub fn end_scope(&mut self) {
        self.push(FilterCommand::EndScope);
    }

    pub fn clear_target(&mut self, target: TargetId, color: [f64; 4]) {
        self.push(FilterCommand::Clear { target, color });
    }

    pub fn set_global_float(&mut self, name: UniformName, value: f32) {
        self.push(FilterCommand::SetGlobalFloat { name, value });
    }

    pub fn blit(&mut self, src: TargetId, dst: TargetId) {
        self.push(FilterCommand::Blit { src, dst, pass: None });
    }

    pub fn blit_with(&mut self, src: TargetId, dst: TargetId, pass: SubPass) {
        self.push(FilterCommand::Blit {
            src,
            dst,
            pass: Some(pass),
        });
    }

    pub fn commands(&self) -> &[FilterCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of GPU filter operations (blits) in the list.
    pub fn filter_op_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_filter_op()).count()
    }

    /// Values recorded for `name` with `SetGlobalFloat`, in order.
    pub fn global_floats(&self, name: UniformName) -> Vec<f32> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                FilterCommand::SetGlobalFloat { name: n, value } if *n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Rejects blits that read and write the same target and unbalanced scopes.
    pub fn validate(&self) -> Result<()> {
        let mut depth = 0usize;
        for (i, command) in self.commands.iter().enumerate() {
            match command {
                FilterCommand::BeginScope(_) => depth += 1,
                FilterCommand::EndScope => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        LightShaftsError::InvalidCommandList(format!("command {i}: scope end without begin"))
                    })?;
                }
                FilterCommand::Blit { src, dst, .. } if src == dst => {
                    return Err(LightShaftsError::InvalidCommandList(format!(
                        "command {i}: {src:?} bound as both source and destination"
                    )));
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(LightShaftsError::InvalidCommandList(format!("{depth} unclosed scope(s)")));
        }
        Ok(())
    }
}

/// Recycles command lists between frames.
#[derive(Debug, Default)]
pub struct CommandListPool {
    free: Vec<CommandList>,
}

impl CommandListPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self) -> CommandList {
        self.free.pop().unwrap_or_default()
    }

    /// Clears the list and keeps it for the next `get`.
    pub fn release(&mut self, mut list: CommandList) {
        list.clear();
        self.free.push(list);
    }

    /// Check out a list that goes back to the pool when the guard drops,
    /// including when the holder unwinds.
    pub fn checkout(&mut self) -> PooledCommandList<'_> {
        let list = self.get();
        PooledCommandList { pool: self, list }
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

pub struct PooledCommandList<'a> {
    pool: &'a mut CommandListPool,
    list: CommandList,
}

impl Deref for PooledCommandList<'_> {
    type Target = CommandList;

    fn deref(&self) -> &CommandList {
        &self.list
    }
}

impl DerefMut for PooledCommandList<'_> {
    fn deref_mut(&mut self) -> &mut CommandList {
        &mut self.list
    }
}

impl Drop for PooledCommandList<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.list));
    }
}
