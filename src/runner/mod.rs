//! Execution Engine.
//!
//! Owns at most one session at a time and drives it through the state
//! machine `Idle → Running → {Succeeded | Aborted | Preempted}`. The runtime
//! is an actor: it consumes [`RunnerCommand`]s from a channel, so `Run` and
//! `Cancel` are serialized with the step loop by construction and the single
//! running session needs no locking.
//!
//! One loop iteration = exactly one unit of interpreter work. Between units
//! the loop polls for a pending cancel and yields to the scheduler, which
//! bounds both cancellation latency and stack depth regardless of program
//! length. Cancellation is cooperative: a unit already in progress is never
//! interrupted.

pub mod session;

use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::caps::{CapabilityBindings, Host};
use crate::channels::{ErrorChannel, StatusChannel};
use crate::config::{BusyPolicy, Config};
use crate::goal::{Goal, GoalEvent, RunnerCommand};
use crate::robot::RobotBackend;
use crate::script::{ScriptEngine, StepOutcome};

use session::SessionState;

/// The step-wise program runtime.
pub struct Runtime {
    on_busy: BusyPolicy,
    command_capacity: usize,
    feedback_capacity: usize,
    bindings: CapabilityBindings,
    scripts: Arc<dyn ScriptEngine>,
    status: StatusChannel,
    errors: ErrorChannel,
}

impl Runtime {
    pub fn new(
        config: &Config,
        robot: Arc<dyn RobotBackend>,
        scripts: Arc<dyn ScriptEngine>,
    ) -> Self {
        Self {
            on_busy: config.runner.on_busy,
            command_capacity: config.runner.command_capacity,
            feedback_capacity: config.runner.feedback_capacity,
            bindings: CapabilityBindings::new(robot),
            scripts,
            status: StatusChannel::new(),
            errors: ErrorChannel::new(config.runner.error_capacity),
        }
    }

    /// The latched run-state channel.
    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    /// The transient error channel.
    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Spawns the runtime as a background task and returns the handle the
    /// goal protocol transport drives it through.
    pub fn spawn(self) -> RunnerHandle {
        let feedback_capacity = self.feedback_capacity;
        let (cmd_tx, cmd_rx) = mpsc::channel(self.command_capacity);
        tokio::spawn(self.run(cmd_rx));
        RunnerHandle {
            cmd_tx,
            feedback_capacity,
        }
    }

    /// Main loop: waits for goals while idle, runs one session at a time.
    pub async fn run(self, mut cmd_rx: mpsc::Receiver<RunnerCommand>) {
        info!("Runtime started, waiting for goals");
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                RunnerCommand::Run(goal) => {
                    // Preemption hands the replacement goal back; run it
                    // without going through the idle wait.
                    let mut next = Some(goal);
                    while let Some(goal) = next.take() {
                        next = self.run_session(goal, &mut cmd_rx).await;
                    }
                }
                RunnerCommand::Cancel => {
                    debug!("Cancel received while idle, nothing to stop");
                }
            }
        }
        info!("Command channel closed, runtime exiting");
    }

    /// Runs one session to its terminal transition. Returns a goal only when
    /// the session was preempted by a replacement under `BusyPolicy::Preempt`.
    async fn run_session(
        &self,
        goal: Goal,
        cmd_rx: &mut mpsc::Receiver<RunnerCommand>,
    ) -> Option<Goal> {
        let session_id = Uuid::new_v4();
        info!(%session_id, "Starting program ({} bytes)", goal.program.len());

        let mut interpreter = match self.scripts.create(&goal.program) {
            Ok(interpreter) => interpreter,
            Err(fault) => {
                // The session never entered Running, so the status channel
                // stays untouched: publishing here would break the
                // one-true-one-false invariant.
                warn!(%session_id, "Program rejected: {fault}");
                let reason = fault.message().to_string();
                self.errors.publish(reason.clone());
                goal.finish(GoalEvent::Aborted { reason }).await;
                return None;
            }
        };

        let mut state = SessionState::new();
        self.status.publish(true);

        loop {
            // Pending control requests are observed here, before the next
            // unit of work begins. This is the only cancellation point.
            match cmd_rx.try_recv() {
                Ok(RunnerCommand::Cancel) => {
                    info!(%session_id, "Program was stopped by the user");
                    self.status.publish(false);
                    goal.finish(GoalEvent::Preempted).await;
                    return None;
                }
                Ok(RunnerCommand::Run(next)) => match self.on_busy {
                    BusyPolicy::Reject => {
                        warn!(%session_id, "New goal rejected, a program is already running");
                        next.finish(GoalEvent::Aborted {
                            reason: "a program is already running".to_string(),
                        })
                        .await;
                    }
                    BusyPolicy::Preempt => {
                        info!(%session_id, "Program preempted by a new goal");
                        self.status.publish(false);
                        goal.finish(GoalEvent::Preempted).await;
                        return Some(next);
                    }
                },
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    // The controller went away. Stop rather than leave the
                    // robot running a program nobody observes.
                    warn!(%session_id, "Controller disconnected, stopping program");
                    self.status.publish(false);
                    goal.finish(GoalEvent::Preempted).await;
                    return None;
                }
            }

            let outcome = {
                let mut host = Host::new(&self.bindings, &mut state);
                interpreter.step(&mut host).await
            };

            match outcome {
                Ok(StepOutcome::MoreWork) => {
                    // Soft errors are reported, not fatal: the program keeps
                    // running after a failed robot command.
                    for soft in state.take_soft_errors() {
                        warn!(%session_id, "Robot command failed: {soft}");
                        self.errors.publish(soft.message());
                    }
                    goal.feedback(state.current_block());
                    // Re-enter through the scheduler rather than a direct
                    // call, so the host stays responsive however long the
                    // program runs.
                    tokio::task::yield_now().await;
                }
                Ok(StepOutcome::Done) => {
                    info!(%session_id, "Program complete");
                    goal.finish(GoalEvent::Succeeded).await;
                    self.status.publish(false);
                    return None;
                }
                Err(fault) => {
                    error!(%session_id, "Program aborted: {fault}");
                    let reason = fault.message().to_string();
                    goal.finish(GoalEvent::Aborted {
                        reason: reason.clone(),
                    })
                    .await;
                    self.errors.publish(reason);
                    self.status.publish(false);
                    return None;
                }
            }
        }
    }
}

/// Handle held by the goal protocol transport.
///
/// Sizes each goal's reply channel from the configured feedback capacity and
/// relays start/cancel requests to the runtime.
pub struct RunnerHandle {
    cmd_tx: mpsc::Sender<RunnerCommand>,
    feedback_capacity: usize,
}

impl RunnerHandle {
    /// Submits a program. Returns the reply channel its feedback frames and
    /// terminal result arrive on.
    pub async fn submit(
        &self,
        program: impl Into<String>,
    ) -> anyhow::Result<mpsc::Receiver<GoalEvent>> {
        let (goal, reply_rx) = Goal::new(program, self.feedback_capacity);
        self.cmd_tx
            .send(RunnerCommand::Run(goal))
            .await
            .map_err(|_| anyhow!("runtime is no longer running"))?;
        Ok(reply_rx)
    }

    /// Requests cancellation of the running program, if any.
    pub async fn cancel(&self) -> anyhow::Result<()> {
        self.cmd_tx
            .send(RunnerCommand::Cancel)
            .await
            .map_err(|_| anyhow!("runtime is no longer running"))
    }

    /// The raw command channel, for transports that build goals themselves.
    pub fn commands(&self) -> mpsc::Sender<RunnerCommand> {
        self.cmd_tx.clone()
    }
}
