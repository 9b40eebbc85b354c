//! Goal protocol surface.
//!
//! An external controller drives the runtime through a command channel and
//! observes one goal at a time through the reply channel that goal carries.
//! Feedback frames are fire-and-forget; terminal results are always
//! delivered.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Commands sent by the controller to the runtime.
#[derive(Debug)]
pub enum RunnerCommand {
    /// Run a program. Exactly one terminal event will be sent on the goal's
    /// reply channel.
    Run(Goal),
    /// Stop the running program, if any. Cooperative: takes effect before
    /// the next unit of work.
    Cancel,
}

/// Progress snapshot emitted after each completed unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub block_id: String,
}

/// Events emitted by the runtime for one goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalEvent {
    Feedback(Feedback),
    /// The program ran to natural completion.
    Succeeded,
    /// The program raised, or could not be started.
    Aborted { reason: String },
    /// The program was stopped by a cancel request.
    Preempted,
}

/// An external request to run a program, with the channel its feedback and
/// terminal result travel back on.
#[derive(Debug)]
pub struct Goal {
    pub program: String,
    reply_tx: mpsc::Sender<GoalEvent>,
}

impl Goal {
    /// Creates a goal and the receiving end of its reply channel.
    pub fn new(program: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<GoalEvent>) {
        let (reply_tx, reply_rx) = mpsc::channel(capacity);
        (
            Self {
                program: program.into(),
                reply_tx,
            },
            reply_rx,
        )
    }

    /// Sends a feedback frame. Never blocks the step loop: a frame the
    /// observer has no room for is dropped.
    pub(crate) fn feedback(&self, block_id: &str) {
        let event = GoalEvent::Feedback(Feedback {
            block_id: block_id.to_string(),
        });
        if self.reply_tx.try_send(event).is_err() {
            debug!("Feedback observer lagging, frame dropped");
        }
    }

    /// Sends the terminal event, consuming the goal. Waits for channel room
    /// so a result is never dropped; a hung-up observer is ignored.
    pub(crate) async fn finish(self, event: GoalEvent) {
        let _ = self.reply_tx.send(event).await;
    }
}
