//! Per-instance lifecycle.
//!
//! ```text
//! Absent -> Creating -> Present -> (Updating -> Present)* -> Deleting -> Absent
//! ```
//!
//! Replacement runs `Present -> Deleting -> Absent -> Creating -> Present`.

use std::fmt;

use crate::error::{EngineError, Result};
use crate::types::Action;

/// Lifecycle phase of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

/// Remote operation that moves an instance between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Present => "present",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
        };
        write!(f, "{}", name)
    }
}

impl Phase {
    /// Starting phase given whether prior state exists
    pub fn from_prior(exists: bool) -> Self {
        if exists { Self::Present } else { Self::Absent }
    }

    /// Enter the in-flight phase for `operation`
    pub fn begin(self, operation: Operation) -> Result<Self> {
        match (self, operation) {
            (Self::Absent, Operation::Create) => Ok(Self::Creating),
            (Self::Present, Operation::Update) => Ok(Self::Updating),
            (Self::Present, Operation::Delete) => Ok(Self::Deleting),
            (phase, operation) => Err(EngineError::IllegalTransition {
                operation: operation.to_string(),
                phase: phase.to_string(),
            }),
        }
    }

    /// Settle after the in-flight operation succeeded
    pub fn complete(self) -> Self {
        match self {
            Self::Creating | Self::Updating => Self::Present,
            Self::Deleting => Self::Absent,
            settled => settled,
        }
    }

    /// Settle after the in-flight operation failed. Prior state is kept.
    pub fn fail(self) -> Self {
        match self {
            Self::Creating => Self::Absent,
            Self::Updating | Self::Deleting => Self::Present,
            settled => settled,
        }
    }

    /// Operations needed to carry out `action`
    pub fn steps(action: Action) -> &'static [Operation] {
        match action {
            Action::Create => &[Operation::Create],
            Action::Update => &[Operation::Update],
            Action::Replace => &[Operation::Delete, Operation::Create],
            Action::Delete => &[Operation::Delete],
            Action::NoOp => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut phase = Phase::Absent;
        phase = phase.begin(Operation::Create).unwrap();
        assert_eq!(phase, Phase::Creating);
        phase = phase.complete();
        phase = phase.begin(Operation::Update).unwrap().complete();
        assert_eq!(phase, Phase::Present);
        phase = phase.begin(Operation::Delete).unwrap().complete();
        assert_eq!(phase, Phase::Absent);
    }

    #[test]
    fn test_replacement_sequence() {
        let mut phase = Phase::from_prior(true);
        for op in Phase::steps(Action::Replace) {
            phase = phase.begin(*op).unwrap().complete();
        }
        assert_eq!(phase, Phase::Present);
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(Phase::Absent.begin(Operation::Update).is_err());
        assert!(Phase::Absent.begin(Operation::Delete).is_err());
        assert!(Phase::Present.begin(Operation::Create).is_err());
        let err = Phase::Creating.begin(Operation::Create).unwrap_err();
        assert_eq!(err.to_string(), "cannot create a resource that is creating");
    }

    #[test]
    fn test_failure_rolls_back() {
        assert_eq!(Phase::Creating.fail(), Phase::Absent);
        assert_eq!(Phase::Updating.fail(), Phase::Present);
        assert_eq!(Phase::Deleting.fail(), Phase::Present);
    }

    #[test]
    fn test_noop_has_no_steps() {
        assert!(Phase::steps(Action::NoOp).is_empty());
    }
}
