//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::EngineError;

/// Value of a single attribute.
///
/// Planning needs three states per attribute: a known value, an explicitly
/// absent value (`Null`), and a value the remote system has not produced
/// yet (`Unknown`). Keeping them apart is what lets "known after apply" stay
/// distinct from "intentionally empty".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// Not known until the remote system responds
    #[default]
    Unknown,
    /// Explicitly absent
    Null,
    String(String),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    /// Nested object
    Object(Record),
    /// Collection of nested objects
    List(Vec<Record>),
}

impl Value {
    /// Create a string value
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Whether this value is anything other than `Unknown`
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Whether this value is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value is known and not null
    pub fn is_present(&self) -> bool {
        self.is_known() && !self.is_null()
    }

    /// Whether this value and every nested value is known
    pub fn is_fully_known(&self) -> bool {
        match self {
            Self::Unknown => false,
            Self::Object(record) => record.is_fully_known(),
            Self::List(items) => items.iter().all(Record::is_fully_known),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value, widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(n) => Some(i64::from(*n)),
            Self::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Self::Object(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Record]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the value's type, used in messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Object(_) => "object",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "(known after apply)"),
            Self::Null => write!(f, "null"),
            Self::String(s) => write!(f, "\"{}\"", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int32(n) => write!(f, "{}", n),
            Self::Int64(n) => write!(f, "{}", n),
            Self::Object(record) => write!(f, "{}", record),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Self::Object(value)
    }
}

/// A resource record: attribute name to value, for one resource instance
/// or one nested object.
///
/// An attribute that is not in the map is "not supplied". That differs from
/// an attribute mapped to [`Value::Null`] only for desired configuration;
/// records produced by the mapper always carry every attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    attributes: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// String value of an attribute, if present and a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Non-empty string value of an attribute, or a validation error scoped
    /// to that attribute.
    pub fn require_str(&self, kind: &str, name: &str) -> Result<&str, EngineError> {
        match self.get_str(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(EngineError::Validation {
                kind: kind.to_string(),
                violations: vec![crate::schema::Violation::new(
                    name,
                    "a non-empty value is required",
                )],
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Whether every attribute (recursively) is known
    pub fn is_fully_known(&self) -> bool {
        self.attributes.values().all(Value::is_fully_known)
    }

    /// Names of attributes whose value is `Unknown`, top level only
    pub fn unknown_attributes(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(_, v)| !v.is_known())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", name, value)?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// What the host must do to converge one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Instance is desired but absent
    Create,
    /// Instance exists and differs in updatable attributes
    Update,
    /// Instance exists and differs in a replacement attribute
    Replace,
    /// Instance exists but is no longer desired
    Delete,
    /// Nothing to do
    NoOp,
}

impl Action {
    /// Whether this action changes anything remotely
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }

    /// Plan symbol, as shown in diffs
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
            Self::NoOp => " ",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::NoOp => "no-op",
        };
        write!(f, "{}", name)
    }
}

/// Result of executing one change
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Instance created; carries the new state
    Created(Record),
    /// Instance updated in place
    Updated(Record),
    /// Instance destroyed and recreated
    Replaced(Record),
    /// Instance deleted
    Deleted,
    /// Nothing was done
    Unchanged,
    /// Skipped (dry run or declined)
    Skipped { reason: String },
    /// Operation failed; no state was written for the instance
    Failed { error: String },
}

impl Outcome {
    /// Check if the outcome represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the outcome represents a change
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created(_) | Self::Updated(_) | Self::Replaced(_) | Self::Deleted
        )
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unchanged: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of instances processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.unchanged
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.replaced += other.replaced;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.unchanged += other.unchanged;
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created(_) => self.created += 1,
            Outcome::Updated(_) => self.updated += 1,
            Outcome::Replaced(_) => self.replaced += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of instances reconciled in parallel
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_tri_state() {
        assert!(!Value::Unknown.is_known());
        assert!(Value::Null.is_known());
        assert!(!Value::Null.is_present());
        assert!(Value::string("x").is_present());
    }

    #[test]
    fn test_value_fully_known_nested() {
        let nested = Record::new().with("created", Value::Unknown);
        assert!(!Value::Object(nested.clone()).is_fully_known());
        assert!(!Value::List(vec![nested]).is_fully_known());
        assert!(Value::List(vec![]).is_fully_known());
    }

    #[test]
    fn test_value_widening() {
        assert_eq!(Value::Int32(7).as_i64(), Some(7));
        assert_eq!(Value::Int64(i64::MAX).as_i64(), Some(i64::MAX));
        assert_eq!(Value::Bool(true).as_i64(), None);
    }

    #[test]
    fn test_record_require_str() {
        let record = Record::new().with("id", "").with("name", "acme");
        assert_eq!(record.require_str("organization", "name").unwrap(), "acme");
        assert!(matches!(
            record.require_str("organization", "id"),
            Err(EngineError::Validation { .. })
        ));
        assert!(record.require_str("organization", "missing").is_err());
    }

    #[test]
    fn test_record_unknown_attributes() {
        let record = Record::new()
            .with("id", Value::Unknown)
            .with("name", "acme");
        assert_eq!(record.unknown_attributes(), vec!["id"]);
        assert!(!record.is_fully_known());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::string("a").to_string(), "\"a\"");
        assert_eq!(Value::Unknown.to_string(), "(known after apply)");
        let record = Record::new().with("cidr", "10.0.0.0/8");
        assert_eq!(
            Value::List(vec![record]).to_string(),
            "[{cidr = \"10.0.0.0/8\"}]"
        );
    }

    #[test]
    fn test_summary_add_outcome() {
        let mut summary = ExecuteSummary::default();
        summary.add_outcome(&Outcome::Created(Record::new()));
        summary.add_outcome(&Outcome::Deleted);
        summary.add_outcome(&Outcome::Failed {
            error: "boom".into(),
        });
        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.total(), 3);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_action_symbols() {
        assert_eq!(Action::Replace.symbol(), "-/+");
        assert!(!Action::NoOp.is_change());
        assert_eq!(Action::Update.to_string(), "update");
    }
}
