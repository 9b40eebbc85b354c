//! Status and error publication channels.
//!
//! Two delivery semantics:
//! - the status channel is **latched**: a subscriber that attaches mid-run
//!   immediately observes the last published value, so a dashboard connecting
//!   late still learns whether a program is running;
//! - the error channel is **fire-and-forget**: messages reach only the
//!   observers subscribed at publish time.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Latched boolean "is a program running" channel.
///
/// Backed by a `watch` channel: the sender retains the last value and every
/// new receiver starts from it.
#[derive(Clone)]
pub struct StatusChannel {
    tx: Arc<watch::Sender<bool>>,
}

impl StatusChannel {
    /// Creates the channel with the initial value `false` (no program
    /// has run yet).
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Publishes a new run state. The value is stored even if no
    /// observer is currently attached.
    pub fn publish(&self, running: bool) {
        info!("Program running: {running}");
        self.tx.send_replace(running);
    }

    /// Attaches an observer. The receiver immediately holds the last
    /// published value.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// The last published value.
    pub fn last(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Transient error channel.
///
/// Backed by a `broadcast` channel: a message published while nobody is
/// subscribed is dropped, and late subscribers never see it.
#[derive(Clone)]
pub struct ErrorChannel {
    tx: broadcast::Sender<String>,
}

impl ErrorChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an error message to the observers attached right now.
    pub fn publish(&self, message: impl Into<String>) {
        let message = message.into();
        info!("Publishing error: {message}");
        match self.tx.send(message) {
            Ok(n) => debug!("Error delivered to {n} observer(s)"),
            Err(_) => debug!("No error observers attached, message dropped"),
        }
    }

    /// Attaches an observer. Only messages published from now on are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}
