use std::collections::VecDeque;

use crate::robot::SoftError;

/// Mutable per-session state shared between the engine and the capability
/// bindings.
///
/// Holds the id of the script block currently executing (written by
/// `highlightBlock`, read into each feedback frame) and the soft errors
/// recorded by robot calls since the last completed unit of work.
#[derive(Debug, Default)]
pub struct SessionState {
    current_block: String,
    soft_errors: VecDeque<SoftError>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_block(&mut self, block_id: impl Into<String>) {
        self.current_block = block_id.into();
    }

    pub fn current_block(&self) -> &str {
        &self.current_block
    }

    pub fn record_soft_error(&mut self, error: SoftError) {
        self.soft_errors.push_back(error);
    }

    /// Drains every pending soft error, oldest first.
    pub fn take_soft_errors(&mut self) -> Vec<SoftError> {
        self.soft_errors.drain(..).collect()
    }
}
