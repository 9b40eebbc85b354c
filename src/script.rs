//! Contract with the sandboxed script interpreter.
//!
//! The interpreter itself is an external collaborator: this crate only
//! requires "perform one unit of work, say whether more remain". Each unit of
//! work may call back into the robot through the [`Host`] handle it is given.

use async_trait::async_trait;

use crate::caps::Host;

/// Result of one unit of interpreter work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The program has more work to do.
    MoreWork,
    /// The program ran to natural completion.
    Done,
}

/// An uncaught failure escaping a unit of work (or program creation).
///
/// Fatal to the session: the run aborts and the description is reported on
/// both the goal's result channel and the error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFault {
    message: String,
}

impl ScriptFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ScriptFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ScriptFault {}

/// Creates interpreters from program source text.
///
/// A creation failure (e.g. a parse error) is a [`ScriptFault`]: the goal is
/// aborted before the session ever starts running.
pub trait ScriptEngine: Send + Sync {
    fn create(&self, program: &str) -> Result<Box<dyn Interpreter>, ScriptFault>;
}

/// A live interpreter for one program.
///
/// `step` performs exactly one indivisible unit of work. Capability calls
/// made during the unit go through `host` and complete before `step` returns,
/// so a unit that commands the robot waits for that command.
#[async_trait]
pub trait Interpreter: Send {
    async fn step(&mut self, host: &mut Host<'_>) -> Result<StepOutcome, ScriptFault>;
}
