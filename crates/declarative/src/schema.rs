//! Attribute descriptors and validation.
//!
//! A [`ResourceDescriptor`] is the static table describing one resource
//! kind: its attributes, their types, who owns each value (user or remote
//! system) and the rules desired values must satisfy. Descriptors are built
//! once and checked by [`ResourceDescriptor::new`]; nothing re-validates
//! them afterwards.

use regex::Regex;
use std::collections::HashSet;
use std::fmt;

use crate::error::{EngineError, Result};
use crate::types::{Record, Value};

/// Semantic type of an attribute
#[derive(Debug, Clone)]
pub enum AttrType {
    String,
    Bool,
    Int32,
    Int64,
    /// Nested object with its own attributes
    Object(Vec<AttributeSpec>),
    /// List of nested objects
    List(Vec<AttributeSpec>),
}

impl AttrType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Object(_) => "object",
            Self::List(_) => "list",
        }
    }

    /// Nested attribute specs for object and list types
    pub fn nested(&self) -> Option<&[AttributeSpec]> {
        match self {
            Self::Object(specs) | Self::List(specs) => Some(specs),
            _ => None,
        }
    }
}

/// Who supplies an attribute's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutability {
    /// User must supply it
    Required,
    /// User may supply it; otherwise the default applies
    Optional { default: Value },
    /// Remote system supplies it, possibly changing over time
    Computed,
    /// Remote system supplies it once; never changes afterwards
    ComputedOnce,
}

impl Mutability {
    /// Whether users set this attribute in desired configuration
    pub fn is_user_settable(&self) -> bool {
        matches!(self, Self::Required | Self::Optional { .. })
    }
}

/// Validation rule on a string attribute
#[derive(Debug, Clone)]
pub enum Rule {
    /// Minimum length in characters
    MinLength(usize),
    /// Maximum length in characters
    MaxLength(usize),
    /// Value must match the pattern
    Pattern(PatternRule),
}

/// Regular expression rule. Compiled when the owning descriptor is built.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub source: &'static str,
    pub message: &'static str,
    compiled: Option<Regex>,
}

impl PatternRule {
    fn compile(&mut self, kind: &str, path: &str) -> Result<()> {
        let regex = Regex::new(self.source).map_err(|e| {
            EngineError::schema(kind, format!("invalid pattern on '{}': {}", path, e))
        })?;
        self.compiled = Some(regex);
        Ok(())
    }

    fn is_match(&self, value: &str) -> bool {
        self.compiled.as_ref().is_some_and(|re| re.is_match(value))
    }
}

impl Rule {
    /// Check a string against this rule, returning a message on failure
    fn check(&self, value: &str) -> Option<String> {
        let len = value.chars().count();
        match self {
            Self::MinLength(min) if len < *min => Some(format!(
                "must be at least {} characters long, got {}",
                min, len
            )),
            Self::MaxLength(max) if len > *max => Some(format!(
                "must be at most {} characters long, got {}",
                max, len
            )),
            Self::Pattern(rule) if !rule.is_match(value) => Some(rule.message.to_string()),
            _ => None,
        }
    }
}

/// Description of one attribute.
///
/// Built with the constructors for each mutability and chained flag setters:
///
/// ```ignore
/// AttributeSpec::required("password", AttrType::String)
///     .sensitive()
///     .updatable()
///     .min_length(24)
/// ```
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: &'static str,
    /// Key used in remote JSON bodies (`name` unless overridden)
    pub remote_name: String,
    pub attr_type: AttrType,
    pub mutability: Mutability,
    pub description: &'static str,
    pub sensitive: bool,
    /// Not carried by the remote object; always preserved from the caller
    pub local: bool,
    /// Absence in a remote response is a mapping error
    pub remote_required: bool,
    /// Accepted by the remote update endpoint
    pub updatable: bool,
    /// A change forces destroy and recreate
    pub replace: bool,
    pub rules: Vec<Rule>,
}

impl AttributeSpec {
    fn new(name: &'static str, attr_type: AttrType, mutability: Mutability) -> Self {
        Self {
            name,
            remote_name: name.to_string(),
            attr_type,
            mutability,
            description: "",
            sensitive: false,
            local: false,
            remote_required: false,
            updatable: false,
            replace: false,
            rules: Vec::new(),
        }
    }

    pub fn required(name: &'static str, attr_type: AttrType) -> Self {
        Self::new(name, attr_type, Mutability::Required)
    }

    pub fn optional(name: &'static str, attr_type: AttrType, default: impl Into<Value>) -> Self {
        Self::new(
            name,
            attr_type,
            Mutability::Optional {
                default: default.into(),
            },
        )
    }

    pub fn computed(name: &'static str, attr_type: AttrType) -> Self {
        Self::new(name, attr_type, Mutability::Computed)
    }

    pub fn computed_once(name: &'static str, attr_type: AttrType) -> Self {
        Self::new(name, attr_type, Mutability::ComputedOnce)
    }

    #[must_use]
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Override the remote JSON key
    #[must_use]
    pub fn remote(mut self, remote_name: &str) -> Self {
        self.remote_name = remote_name.to_string();
        self
    }

    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    #[must_use]
    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    #[must_use]
    pub fn remote_required(mut self) -> Self {
        self.remote_required = true;
        self
    }

    #[must_use]
    pub fn updatable(mut self) -> Self {
        self.updatable = true;
        self
    }

    #[must_use]
    pub fn requires_replace(mut self) -> Self {
        self.replace = true;
        self
    }

    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.rules.push(Rule::MinLength(min));
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.rules.push(Rule::MaxLength(max));
        self
    }

    /// Length must be within `min..=max`
    #[must_use]
    pub fn length(self, min: usize, max: usize) -> Self {
        self.min_length(min).max_length(max)
    }

    #[must_use]
    pub fn pattern(mut self, source: &'static str, message: &'static str) -> Self {
        self.rules.push(Rule::Pattern(PatternRule {
            source,
            message,
            compiled: None,
        }));
        self
    }

    pub fn is_user_settable(&self) -> bool {
        self.mutability.is_user_settable()
    }

    /// Static default, for optional attributes
    pub fn default_value(&self) -> Option<&Value> {
        match &self.mutability {
            Mutability::Optional { default } => Some(default),
            _ => None,
        }
    }
}

/// One failed rule, scoped to an attribute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Static description of one resource kind
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    kind: &'static str,
    description: &'static str,
    identity: &'static str,
    attributes: Vec<AttributeSpec>,
}

impl ResourceDescriptor {
    /// Build a descriptor, checking its invariants.
    ///
    /// Fails when names are duplicated, the identity attribute is missing or
    /// user-settable, a default does not match its attribute type, a rule is
    /// attached to a non-string attribute, or a pattern does not compile.
    pub fn new(
        kind: &'static str,
        description: &'static str,
        identity: &'static str,
        mut attributes: Vec<AttributeSpec>,
    ) -> Result<Self> {
        check_specs(kind, "", &mut attributes)?;

        let Some(id_spec) = attributes.iter().find(|a| a.name == identity) else {
            return Err(EngineError::schema(
                kind,
                format!("identity attribute '{}' is not declared", identity),
            ));
        };
        if !matches!(id_spec.attr_type, AttrType::String) {
            return Err(EngineError::schema(kind, "identity attribute must be a string"));
        }
        if id_spec.is_user_settable() {
            return Err(EngineError::schema(
                kind,
                "identity attribute must be computed by the remote system",
            ));
        }

        Ok(Self {
            kind,
            description,
            identity,
            attributes,
        })
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Name of the identity attribute
    pub fn identity(&self) -> &'static str {
        self.identity
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Identity value of a record, if set and non-empty
    pub fn identity_of<'r>(&self, record: &'r Record) -> Option<&'r str> {
        record.get_str(self.identity).filter(|id| !id.is_empty())
    }

    /// Fill absent optional attributes with their static defaults
    pub fn with_defaults(&self, desired: &Record) -> Record {
        let mut record = desired.clone();
        for spec in &self.attributes {
            if let Some(default) = spec.default_value() {
                let absent = record.get(spec.name).is_none_or(Value::is_null);
                if absent {
                    record.set(spec.name, default.clone());
                }
            }
        }
        record
    }

    /// Validate desired configuration, returning every violation found.
    ///
    /// An empty list means the record is acceptable. Unknown values are not
    /// checked; they carry no user input yet.
    pub fn validate(&self, desired: &Record) -> Vec<Violation> {
        let mut violations = Vec::new();

        for name in desired.names() {
            if self.attribute(name).is_none() {
                violations.push(Violation::new(name, "unsupported attribute"));
            }
        }

        for spec in &self.attributes {
            let value = desired.get(spec.name);
            match spec.mutability {
                Mutability::Required => {
                    if value.is_none_or(Value::is_null) {
                        violations.push(Violation::new(spec.name, "required attribute is missing"));
                        continue;
                    }
                }
                Mutability::Computed | Mutability::ComputedOnce => {
                    if value.is_some_and(Value::is_present) {
                        violations.push(Violation::new(
                            spec.name,
                            "attribute is computed by the remote system and cannot be set",
                        ));
                    }
                    continue;
                }
                Mutability::Optional { .. } => {}
            }

            if let Some(value) = value {
                check_value(spec, value, spec.name, &mut violations);
            }
        }

        violations
    }

    /// Validate and wrap violations into an error
    pub fn check(&self, desired: &Record) -> Result<()> {
        let violations = self.validate(desired);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation {
                kind: self.kind.to_string(),
                violations,
            })
        }
    }

    /// Record with identity set and every other attribute unknown
    pub fn skeleton(&self, id: &str) -> Record {
        self.attributes
            .iter()
            .map(|spec| {
                let value = if spec.name == self.identity {
                    Value::string(id)
                } else {
                    Value::Unknown
                };
                (spec.name, value)
            })
            .collect()
    }
}

fn check_specs(kind: &str, prefix: &str, specs: &mut [AttributeSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in specs.iter_mut() {
        let path = if prefix.is_empty() {
            spec.name.to_string()
        } else {
            format!("{}.{}", prefix, spec.name)
        };

        if !seen.insert(spec.name) {
            return Err(EngineError::schema(
                kind,
                format!("duplicate attribute '{}'", path),
            ));
        }
        if let Some(default) = spec.default_value()
            && !type_matches(&spec.attr_type, default)
        {
            return Err(EngineError::schema(
                kind,
                format!(
                    "default for '{}' is {}, expected {}",
                    path,
                    default.type_name(),
                    spec.attr_type.name()
                ),
            ));
        }
        if !spec.rules.is_empty() && !matches!(spec.attr_type, AttrType::String) {
            return Err(EngineError::schema(
                kind,
                format!("rules on non-string attribute '{}'", path),
            ));
        }
        if (spec.updatable || spec.replace) && !spec.is_user_settable() {
            return Err(EngineError::schema(
                kind,
                format!("computed attribute '{}' cannot be updatable or force replacement", path),
            ));
        }
        for rule in &mut spec.rules {
            if let Rule::Pattern(pattern) = rule {
                pattern.compile(kind, &path)?;
            }
        }
        match &mut spec.attr_type {
            AttrType::Object(nested) | AttrType::List(nested) => {
                check_specs(kind, &path, nested)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Whether a value is acceptable for an attribute type. `Unknown` and
/// `Null` match every type.
pub fn type_matches(attr_type: &AttrType, value: &Value) -> bool {
    match (attr_type, value) {
        (_, Value::Unknown | Value::Null) => true,
        (AttrType::String, Value::String(_))
        | (AttrType::Bool, Value::Bool(_))
        | (AttrType::Int32, Value::Int32(_))
        | (AttrType::Int64, Value::Int64(_)) => true,
        (AttrType::Object(specs), Value::Object(record)) => record_matches(specs, record),
        (AttrType::List(specs), Value::List(items)) => {
            items.iter().all(|item| record_matches(specs, item))
        }
        _ => false,
    }
}

fn record_matches(specs: &[AttributeSpec], record: &Record) -> bool {
    record.iter().all(|(name, value)| {
        specs
            .iter()
            .find(|s| s.name == name)
            .is_some_and(|s| type_matches(&s.attr_type, value))
    })
}

fn check_value(spec: &AttributeSpec, value: &Value, path: &str, violations: &mut Vec<Violation>) {
    if !value.is_present() {
        return;
    }
    if !type_matches(&spec.attr_type, value) {
        violations.push(Violation::new(
            path,
            format!("expected {}, got {}", spec.attr_type.name(), value.type_name()),
        ));
        return;
    }
    if let Value::String(s) = value {
        for rule in &spec.rules {
            if let Some(message) = rule.check(s) {
                violations.push(Violation::new(path, message));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceDescriptor {
        ResourceDescriptor::new(
            "sample",
            "test kind",
            "id",
            vec![
                AttributeSpec::computed_once("id", AttrType::String),
                AttributeSpec::required("name", AttrType::String)
                    .length(3, 8)
                    .pattern(r"^\w+$", "must be a single word"),
                AttributeSpec::optional("channel", AttrType::String, "stable"),
                AttributeSpec::optional("units", AttrType::Int32, 0),
                AttributeSpec::computed("dc", AttrType::Object(vec![
                    AttributeSpec::computed_once("created", AttrType::String),
                ])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_remote_name() {
        let spec = AttributeSpec::computed("crate_version", AttrType::String);
        assert_eq!(spec.remote_name, "crate_version");
        let spec = AttributeSpec::computed("ip_allowlist", AttrType::List(vec![])).remote("ip_whitelist");
        assert_eq!(spec.remote_name, "ip_whitelist");
    }

    #[test]
    fn test_descriptor_rejects_duplicate_names() {
        let result = ResourceDescriptor::new(
            "dup",
            "",
            "id",
            vec![
                AttributeSpec::computed_once("id", AttrType::String),
                AttributeSpec::required("name", AttrType::String),
                AttributeSpec::required("name", AttrType::String),
            ],
        );
        assert!(matches!(result, Err(EngineError::Schema { .. })));
    }

    #[test]
    fn test_descriptor_rejects_missing_identity() {
        let result = ResourceDescriptor::new(
            "noid",
            "",
            "id",
            vec![AttributeSpec::required("name", AttrType::String)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_descriptor_rejects_settable_identity() {
        let result = ResourceDescriptor::new(
            "settable",
            "",
            "id",
            vec![AttributeSpec::required("id", AttrType::String)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_descriptor_rejects_mistyped_default() {
        let result = ResourceDescriptor::new(
            "default",
            "",
            "id",
            vec![
                AttributeSpec::computed_once("id", AttrType::String),
                AttributeSpec::optional("units", AttrType::Int32, "zero"),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_descriptor_rejects_bad_pattern() {
        let result = ResourceDescriptor::new(
            "pattern",
            "",
            "id",
            vec![
                AttributeSpec::computed_once("id", AttrType::String),
                AttributeSpec::required("name", AttrType::String).pattern("([", "broken"),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_descriptor_rejects_updatable_computed() {
        let result = ResourceDescriptor::new(
            "computed",
            "",
            "id",
            vec![
                AttributeSpec::computed_once("id", AttrType::String),
                AttributeSpec::computed("url", AttrType::String).updatable(),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_ok() {
        let d = sample();
        let desired = Record::new().with("name", "alpha");
        assert!(d.validate(&desired).is_empty());
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let d = sample();
        let desired = Record::new()
            .with("name", "a-b")
            .with("id", "set-by-user")
            .with("colour", "blue");
        let violations = d.validate(&desired);
        let paths: Vec<_> = violations.iter().map(|v| v.path.as_str()).collect();
        assert!(paths.contains(&"colour"));
        assert!(paths.contains(&"id"));
        assert_eq!(paths.iter().filter(|p| **p == "name").count(), 1);
    }

    #[test]
    fn test_validate_length_counts_characters() {
        let d = sample();
        let violations = d.validate(&Record::new().with("name", "ab"));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("at least 3"));

        let violations = d.validate(&Record::new().with("name", "abcdefghi"));
        assert!(violations[0].message.contains("at most 8"));
    }

    #[test]
    fn test_validate_missing_required() {
        let d = sample();
        let violations = d.validate(&Record::new().with("name", Value::Null));
        assert_eq!(violations, vec![Violation::new("name", "required attribute is missing")]);
    }

    #[test]
    fn test_validate_wrong_type() {
        let d = sample();
        let violations = d.validate(&Record::new().with("name", "alpha").with("units", "two"));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "units");
        assert!(violations[0].message.contains("expected int32"));
    }

    #[test]
    fn test_validate_skips_unknown() {
        let d = sample();
        assert!(d.validate(&Record::new().with("name", Value::Unknown)).is_empty());
    }

    #[test]
    fn test_with_defaults() {
        let d = sample();
        let record = d.with_defaults(&Record::new().with("name", "alpha"));
        assert_eq!(record.get("channel"), Some(&Value::string("stable")));
        assert_eq!(record.get("units"), Some(&Value::Int32(0)));

        let record = d.with_defaults(&Record::new().with("channel", "nightly"));
        assert_eq!(record.get("channel"), Some(&Value::string("nightly")));
    }

    #[test]
    fn test_skeleton() {
        let d = sample();
        let record = d.skeleton("abc");
        assert_eq!(d.identity_of(&record), Some("abc"));
        assert_eq!(record.get("name"), Some(&Value::Unknown));
        assert_eq!(record.len(), d.attributes().len());
    }

    #[test]
    fn test_identity_of_empty_is_none() {
        let d = sample();
        assert_eq!(d.identity_of(&Record::new().with("id", "")), None);
    }

    #[test]
    fn test_check_wraps_violations() {
        let d = sample();
        let err = d.check(&Record::new()).unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref violations, .. } if violations.len() == 1));
    }
}
