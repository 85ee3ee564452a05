//! Plan resolution.
//!
//! Decides, attribute by attribute, where the planned value comes from:
//! the desired configuration, a static default, prior state, or the remote
//! system after apply.

use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::schema::{Mutability, ResourceDescriptor};
use crate::types::{Record, Value};

/// Source of one planned attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Planned {
    /// Supplied by desired configuration
    Desired(Value),
    /// Static default of an absent optional attribute
    Default(Value),
    /// Taken from prior state
    CarryForward(Value),
    /// Known only after the remote call
    Unknown,
}

impl Planned {
    pub fn value(&self) -> Value {
        match self {
            Self::Desired(v) | Self::Default(v) | Self::CarryForward(v) => v.clone(),
            Self::Unknown => Value::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown) || !self.value().is_known()
    }
}

/// A single attribute change between prior state and plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub name: String,
    pub from: Value,
    pub to: Value,
    /// Value must not be displayed
    pub sensitive: bool,
    /// Sent to the update endpoint (false for ignored changes)
    pub applied: bool,
}

/// Resolved plan for one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDelta {
    entries: BTreeMap<String, Planned>,
    ignored: Vec<String>,
}

impl PlanDelta {
    pub fn get(&self, name: &str) -> Option<&Planned> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Planned)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Changed attributes the update endpoint cannot carry
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    /// Attributes that will only be known after apply
    pub fn unknowns(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, p)| p.is_unknown())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Planned record, with `Unknown` for values the remote will supply
    pub fn planned_record(&self) -> Record {
        self.entries
            .iter()
            .map(|(k, p)| (k.clone(), p.value()))
            .collect()
    }

    /// User-settable attributes whose planned value differs from `prior`
    pub fn changes(&self, descriptor: &ResourceDescriptor, prior: Option<&Record>) -> Vec<AttributeChange> {
        descriptor
            .attributes()
            .iter()
            .filter(|spec| spec.is_user_settable())
            .filter_map(|spec| {
                let to = self.entries.get(spec.name)?.value();
                let from = prior
                    .and_then(|p| p.get(spec.name))
                    .cloned()
                    .unwrap_or(Value::Null);
                if from == to || (prior.is_none() && !to.is_present()) {
                    return None;
                }
                Some(AttributeChange {
                    name: spec.name.to_string(),
                    from,
                    to,
                    sensitive: spec.sensitive,
                    applied: prior.is_none() || spec.updatable,
                })
            })
            .collect()
    }
}

/// Resolve desired configuration against prior state.
///
/// Rules, per attribute:
/// 1. required or optional and present in desired: the desired value;
/// 2. optional and absent: the prior value if any, else the static default;
/// 3. computed: the prior value if any, else unknown;
/// 4. computed-once: the prior value if present, else unknown.
///
/// Fails with [`EngineError::ReplacementRequired`] naming every replacement
/// attribute whose desired value differs from prior.
pub fn resolve(
    descriptor: &ResourceDescriptor,
    desired: &Record,
    prior: Option<&Record>,
) -> Result<PlanDelta> {
    let mut entries = BTreeMap::new();
    let mut replaced = Vec::new();
    let mut ignored = Vec::new();

    for spec in descriptor.attributes() {
        let desired_value = desired.get(spec.name).filter(|v| !v.is_null());
        let prior_value = prior.and_then(|p| p.get(spec.name));

        let planned = match &spec.mutability {
            Mutability::Required => match desired_value {
                Some(v) => Planned::Desired(v.clone()),
                None => match prior_value {
                    Some(v) if v.is_known() => Planned::CarryForward(v.clone()),
                    _ => Planned::Unknown,
                },
            },
            Mutability::Optional { default } => match (desired_value, prior_value) {
                (Some(v), _) => Planned::Desired(v.clone()),
                (None, Some(v)) if v.is_known() => Planned::CarryForward(v.clone()),
                (None, _) => Planned::Default(default.clone()),
            },
            Mutability::Computed => match prior_value {
                Some(v) if v.is_known() => Planned::CarryForward(v.clone()),
                _ => Planned::Unknown,
            },
            Mutability::ComputedOnce => match prior_value {
                Some(v) if v.is_present() => Planned::CarryForward(v.clone()),
                _ => Planned::Unknown,
            },
        };

        if let (Some(prior_value), Planned::Desired(value)) = (prior_value, &planned)
            && prior_value.is_known()
            && prior_value != value
        {
            if spec.replace {
                replaced.push(spec.name.to_string());
            } else if !spec.updatable {
                ignored.push(spec.name.to_string());
            }
        }

        entries.insert(spec.name.to_string(), planned);
    }

    if !replaced.is_empty() {
        return Err(EngineError::ReplacementRequired {
            kind: descriptor.kind().to_string(),
            attributes: replaced,
        });
    }

    Ok(PlanDelta { entries, ignored })
}
