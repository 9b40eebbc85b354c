//! robotask — a step-wise robot program runtime.
//!
//! Executes a user-authored script one interpreter step at a time while an
//! external controller drives the run through a goal protocol (start, cancel,
//! feedback, terminal result). The script talks to the physical robot through
//! a fixed capability API; the runtime publishes a latched "is running"
//! status and a fire-and-forget error stream.
//!
//! The script interpreter and the robot command surface are external
//! collaborators, consumed through the [`script::ScriptEngine`] and
//! [`robot::RobotBackend`] traits.

pub mod caps;
pub mod channels;
pub mod config;
pub mod goal;
pub mod robot;
pub mod runner;
pub mod script;

pub use channels::{ErrorChannel, StatusChannel};
pub use config::{BusyPolicy, Config};
pub use goal::{Feedback, Goal, GoalEvent, RunnerCommand};
pub use robot::{RobotBackend, SoftError};
pub use runner::{RunnerHandle, Runtime};
pub use script::{Interpreter, ScriptEngine, ScriptFault, StepOutcome};
