//! Execution callbacks
//!
//! These traits let the executor report progress, ask for confirmation and
//! persist state without depending on a particular terminal UI or storage.

use crate::types::{Action, Outcome, Record};
use anyhow::Result;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called before any instance is applied
    fn on_start(&mut self, count: usize);

    /// Called when an instance is about to be applied
    fn on_instance_start(&mut self, address: &str, action: Action);

    /// Called when an instance has been applied
    fn on_instance_complete(&mut self, address: &str, outcome: &Outcome);

    /// Called after every instance has been applied
    fn on_complete(&mut self);
}

/// Confirmation callback for user interaction
///
/// Implement this trait to handle user confirmations.
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Receives every state transition the executor commits.
///
/// Called once per completed remote operation, so a failure later in the
/// run never loses state for work already done. `None` means the instance
/// no longer exists.
pub trait StateSink: Sync {
    fn commit(&self, address: &str, kind: &str, state: Option<&Record>) -> Result<()>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _count: usize) {}
    fn on_instance_start(&mut self, _address: &str, _action: Action) {}
    fn on_instance_complete(&mut self, _address: &str, _outcome: &Outcome) {}
    fn on_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Sink that discards every commit
pub struct NoState;

impl StateSink for NoState {
    fn commit(&self, _address: &str, _kind: &str, _state: Option<&Record>) -> Result<()> {
        Ok(())
    }
}
