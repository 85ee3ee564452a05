//! Change planning across every declared and stored instance

use anyhow::{Result, bail};
use cratedb::Gateway;
use declarative::{EngineError, InstanceDiff, Record};
use rayon::prelude::*;
use std::collections::BTreeSet;

use crate::config::{DesiredConfig, split_address};
use crate::resource::CloudRegistry;
use crate::state::StateStore;

/// Narrows planning to one kind, or one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: String,
    pub name: Option<String>,
}

impl Target {
    /// Check if an address falls under this target
    pub fn matches(&self, address: &str) -> bool {
        match split_address(address) {
            Some((kind, name)) => {
                kind == self.kind && self.name.as_deref().is_none_or(|n| n == name)
            }
            None => false,
        }
    }
}

/// Parse a target string like "cluster" or "cluster.analytics"
pub fn parse_target(target: &str, registry: &CloudRegistry) -> Result<Target> {
    let (kind, name) = match target.split_once('.') {
        Some(_) => match split_address(target) {
            Some((kind, name)) => (kind, Some(name.to_string())),
            None => bail!("Invalid target '{}', expected kind or kind.name", target),
        },
        None => (target, None),
    };
    registry.get(kind)?;
    Ok(Target {
        kind: kind.to_string(),
        name,
    })
}

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Read every stored instance from the remote system first
    pub refresh: bool,
    pub target: Option<Target>,
    /// Plan the deletion of every stored instance
    pub destroy: bool,
}

/// Changes needed to converge, one diff per address
#[derive(Debug, Default)]
pub struct Plan {
    /// Sorted by address
    pub diffs: Vec<InstanceDiff>,
    /// Stored instances that no longer exist remotely
    pub gone: Vec<String>,
}

impl Plan {
    pub fn has_changes(&self) -> bool {
        self.diffs.iter().any(InstanceDiff::has_changes)
    }
}

/// One stored instance, decoded
struct Prior {
    address: String,
    kind: String,
    record: Record,
}

/// Result of reading one stored instance
enum Refreshed {
    Current(Record),
    Gone,
    Failed(String),
}

/// Compare desired configuration with (optionally refreshed) state
pub fn build_plan(
    registry: &CloudRegistry,
    gateway: &(dyn Gateway + 'static),
    desired: &DesiredConfig,
    store: &StateStore,
    opts: &PlanOptions,
) -> Result<Plan> {
    let in_scope = |address: &str| opts.target.as_ref().is_none_or(|t| t.matches(address));

    let mut priors = load_priors(registry, store, &in_scope)?;
    let mut plan = Plan::default();
    let mut problems = Vec::new();

    if opts.refresh {
        let refreshed = refresh(registry, gateway, &priors);
        let mut current = Vec::with_capacity(priors.len());
        for (prior, result) in priors.into_iter().zip(refreshed) {
            match result {
                Refreshed::Current(record) => current.push(Prior { record, ..prior }),
                Refreshed::Gone => {
                    log::warn!("{} no longer exists remotely", prior.address);
                    plan.gone.push(prior.address);
                }
                Refreshed::Failed(error) => {
                    problems.push(format!("{}: {}", prior.address, error));
                    current.push(prior);
                }
            }
        }
        priors = current;
    }

    let mut addresses: BTreeSet<&str> = priors.iter().map(|p| p.address.as_str()).collect();
    if !opts.destroy {
        addresses.extend(
            desired
                .instances
                .keys()
                .map(String::as_str)
                .filter(|address| in_scope(address)),
        );
    }

    for address in addresses {
        let prior = priors.iter().find(|p| p.address == address);
        let declared = if opts.destroy {
            None
        } else {
            desired.get(address)
        };
        let kind = match (declared, prior) {
            (Some(instance), _) => instance.kind.as_str(),
            (None, Some(prior)) => prior.kind.as_str(),
            (None, None) => continue,
        };

        let reconciler = registry.reconciler(kind, gateway)?;
        match reconciler.plan(
            address,
            declared.map(|d| &d.record),
            prior.map(|p| &p.record),
        ) {
            Ok(diff) => {
                if !diff.ignored.is_empty() {
                    log::warn!(
                        "{}: {} cannot be changed in place and will be left as is",
                        address,
                        diff.ignored.join(", ")
                    );
                }
                plan.diffs.push(diff);
            }
            Err(EngineError::Validation { violations, .. }) => {
                for violation in violations {
                    problems.push(format!("{}.{}", address, violation));
                }
            }
            Err(e) => problems.push(format!("{}: {}", address, e)),
        }
    }

    if !problems.is_empty() {
        bail!("Planning failed:\n  {}", problems.join("\n  "));
    }

    Ok(plan)
}

/// Outcome of a state refresh
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub gone: usize,
    pub failed: usize,
}

/// Read every stored instance and write what the remote system reports.
///
/// Instances that no longer exist are dropped from state.
pub fn refresh_state(
    registry: &CloudRegistry,
    gateway: &(dyn Gateway + 'static),
    store: &StateStore,
    target: Option<&Target>,
) -> Result<RefreshSummary> {
    let priors = load_priors(registry, store, &|address: &str| {
        target.is_none_or(|t| t.matches(address))
    })?;

    let mut summary = RefreshSummary::default();
    let results = refresh(registry, gateway, &priors);
    for (prior, result) in priors.iter().zip(results) {
        let descriptor = registry.descriptor(&prior.kind)?;
        match result {
            Refreshed::Current(record) => {
                store.put(&prior.address, descriptor, Some(&record))?;
                summary.refreshed += 1;
            }
            Refreshed::Gone => {
                log::warn!("{} no longer exists remotely, removing it from state", prior.address);
                store.put(&prior.address, descriptor, None)?;
                summary.gone += 1;
            }
            Refreshed::Failed(error) => {
                log::error!("{}: {}", prior.address, error);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

fn load_priors(
    registry: &CloudRegistry,
    store: &StateStore,
    in_scope: &dyn Fn(&str) -> bool,
) -> Result<Vec<Prior>> {
    let mut priors = Vec::new();
    for (address, stored) in store.entries() {
        if !in_scope(&address) {
            continue;
        }
        let descriptor = registry.descriptor(&stored.kind)?;
        if let Some(record) = store.record(&address, descriptor)? {
            priors.push(Prior {
                address,
                kind: stored.kind,
                record,
            });
        }
    }
    Ok(priors)
}

/// Read stored instances in parallel, preserving order
fn refresh(
    registry: &CloudRegistry,
    gateway: &(dyn Gateway + 'static),
    priors: &[Prior],
) -> Vec<Refreshed> {
    priors
        .par_iter()
        .map(|prior| {
            let reconciler = match registry.reconciler(&prior.kind, gateway) {
                Ok(reconciler) => reconciler,
                Err(e) => return Refreshed::Failed(e.to_string()),
            };
            match reconciler.read(&prior.record) {
                Ok(record) => Refreshed::Current(record),
                Err(EngineError::ResourceGone { .. }) => Refreshed::Gone,
                Err(e) => Refreshed::Failed(e.diagnostic("read", &prior.kind).to_string()),
            }
        })
        .collect()
}
