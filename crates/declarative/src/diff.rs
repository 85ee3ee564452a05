//! Diff computation for resource instances

use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::plan::{self, AttributeChange};
use crate::schema::ResourceDescriptor;
use crate::types::{Action, Record};

/// Planned change for one instance
#[derive(Debug, Clone)]
pub struct InstanceDiff {
    /// Host address (`kind.name`)
    pub address: String,
    /// Resource kind
    pub kind: String,
    /// What must happen
    pub action: Action,
    /// Attribute-level changes
    pub changes: Vec<AttributeChange>,
    /// Attributes known only after apply
    pub unknowns: Vec<String>,
    /// Attributes forcing replacement
    pub replace_reasons: Vec<String>,
    /// Changed attributes the update endpoint does not accept
    pub ignored: Vec<String>,
    /// Desired configuration, if the instance is declared
    pub desired: Option<Record>,
    /// Prior state, if the instance exists
    pub prior: Option<Record>,
}

impl InstanceDiff {
    /// Compare desired configuration with prior state.
    ///
    /// Desired configuration is validated first; invalid configuration
    /// never yields a diff.
    pub fn compute(
        descriptor: &ResourceDescriptor,
        address: &str,
        desired: Option<&Record>,
        prior: Option<&Record>,
    ) -> Result<Self> {
        let mut diff = Self {
            address: address.to_string(),
            kind: descriptor.kind().to_string(),
            action: Action::NoOp,
            changes: Vec::new(),
            unknowns: Vec::new(),
            replace_reasons: Vec::new(),
            ignored: Vec::new(),
            desired: desired.cloned(),
            prior: prior.cloned(),
        };

        match (desired, prior) {
            (None, None) => {}
            (None, Some(_)) => diff.action = Action::Delete,
            (Some(desired), None) => {
                let defaulted = descriptor.with_defaults(desired);
                descriptor.check(&defaulted)?;
                let delta = plan::resolve(descriptor, &defaulted, None)?;
                diff.action = Action::Create;
                diff.changes = delta.changes(descriptor, None);
                diff.unknowns = owned(delta.unknowns());
            }
            (Some(desired), Some(prior)) => {
                descriptor.check(desired)?;
                match plan::resolve(descriptor, desired, Some(prior)) {
                    Ok(delta) => {
                        diff.changes = delta.changes(descriptor, Some(prior));
                        diff.ignored = delta.ignored().to_vec();
                        diff.unknowns = owned(delta.unknowns());
                        if diff.changes.iter().any(|c| c.applied) {
                            diff.action = Action::Update;
                        }
                    }
                    Err(EngineError::ReplacementRequired { attributes, .. }) => {
                        let defaulted = descriptor.with_defaults(desired);
                        let delta = plan::resolve(descriptor, &defaulted, None)?;
                        diff.action = Action::Replace;
                        diff.changes = delta.changes(descriptor, Some(prior));
                        for change in &mut diff.changes {
                            change.applied = true;
                        }
                        diff.unknowns = owned(delta.unknowns());
                        diff.replace_reasons = attributes;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(diff)
    }

    /// Check if this diff changes anything remotely
    pub fn has_changes(&self) -> bool {
        self.action.is_change()
    }
}

fn owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of instances to create
    pub creations: usize,
    /// Number of instances to update in place
    pub updates: usize,
    /// Number of instances to destroy and recreate
    pub replacements: usize,
    /// Number of instances to delete
    pub deletions: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[InstanceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.action {
                Action::Create => summary.creations += 1,
                Action::Update => summary.updates += 1,
                Action::Replace => summary.replacements += 1,
                Action::Delete => summary.deletions += 1,
                Action::NoOp => {}
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.creations + self.updates + self.replacements + self.deletions
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource kind
pub fn group_by_kind(diffs: &[InstanceDiff]) -> BTreeMap<String, Vec<&InstanceDiff>> {
    let mut groups: BTreeMap<String, Vec<&InstanceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups.entry(diff.kind.clone()).or_default().push(diff);
    }
    groups
}
