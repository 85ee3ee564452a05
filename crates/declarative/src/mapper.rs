//! Conversion between records and JSON.
//!
//! Two JSON shapes exist for a record:
//!
//! - the **remote** shape, keyed by each attribute's `remote_name`, used for
//!   request and response bodies ([`decode`], [`encode`], [`encode_remote`]);
//! - the **document** shape, keyed by attribute name, used for configuration
//!   and persisted state ([`to_document`], [`from_document`]).
//!
//! After a remote call, [`merge_preserved`] puts back values the remote
//! object does not return faithfully.

use serde_json::{Map, Value as Json};

use crate::error::{EngineError, Result};
use crate::schema::{AttrType, AttributeSpec, Mutability, ResourceDescriptor, Violation};
use crate::types::{Record, Value};

/// Which request a body is encoded for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Every user-settable, non-local attribute
    Create,
    /// Only attributes the update endpoint accepts
    Update,
}

/// Decode a remote response body into a record.
///
/// Every attribute of the descriptor appears in the result. Local
/// attributes are `Null`; absent optional lists are empty; other absent
/// values are `Null`.
pub fn decode(descriptor: &ResourceDescriptor, raw: &Json) -> Result<Record> {
    let Json::Object(object) = raw else {
        return Err(EngineError::mapping(
            descriptor.kind(),
            "",
            format!("expected a JSON object, got {}", json_type(raw)),
        ));
    };
    decode_object(descriptor.kind(), descriptor.attributes(), object, "")
}

fn decode_object(
    kind: &str,
    specs: &[AttributeSpec],
    object: &Map<String, Json>,
    prefix: &str,
) -> Result<Record> {
    let mut record = Record::new();
    for spec in specs {
        let path = join_path(prefix, spec.name);
        let value = if spec.local {
            Value::Null
        } else {
            decode_value(kind, spec, object.get(&spec.remote_name), &path)?
        };
        record.set(spec.name, value);
    }
    Ok(record)
}

fn decode_value(kind: &str, spec: &AttributeSpec, raw: Option<&Json>, path: &str) -> Result<Value> {
    let raw = match raw {
        None | Some(Json::Null) => {
            if spec.remote_required {
                return Err(EngineError::mapping(kind, path, "required field is missing"));
            }
            return Ok(match spec.attr_type {
                AttrType::List(_) => Value::List(Vec::new()),
                _ => Value::Null,
            });
        }
        Some(raw) => raw,
    };

    let mismatch = || {
        EngineError::mapping(
            kind,
            path,
            format!("expected {}, got {}", spec.attr_type.name(), json_type(raw)),
        )
    };

    match &spec.attr_type {
        AttrType::String => raw.as_str().map(Value::string).ok_or_else(mismatch),
        AttrType::Bool => raw.as_bool().map(Value::Bool).ok_or_else(mismatch),
        AttrType::Int32 => {
            let n = json_integer(raw).ok_or_else(mismatch)?;
            i32::try_from(n)
                .map(Value::Int32)
                .map_err(|_| EngineError::mapping(kind, path, format!("{} overflows int32", n)))
        }
        AttrType::Int64 => {
            let n = json_integer(raw).ok_or_else(mismatch)?;
            i64::try_from(n)
                .map(Value::Int64)
                .map_err(|_| EngineError::mapping(kind, path, format!("{} overflows int64", n)))
        }
        AttrType::Object(nested) => {
            let object = raw.as_object().ok_or_else(mismatch)?;
            decode_object(kind, nested, object, path).map(Value::Object)
        }
        AttrType::List(nested) => {
            let items = raw.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = format!("{}[{}]", path, i);
                    let object = item.as_object().ok_or_else(|| {
                        EngineError::mapping(
                            kind,
                            &item_path,
                            format!("expected object, got {}", json_type(item)),
                        )
                    })?;
                    decode_object(kind, nested, object, &item_path)
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        }
    }
}

/// Integer value of a JSON number, widened so overflow can be reported
fn json_integer(raw: &Json) -> Option<i128> {
    let Json::Number(n) = raw else {
        return None;
    };
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Encode a record into a request body.
///
/// Computed, computed-once and local attributes are never sent, nor are
/// unknown or null values.
pub fn encode(descriptor: &ResourceDescriptor, record: &Record, purpose: Purpose) -> Result<Json> {
    let mut body = Map::new();
    for spec in descriptor.attributes() {
        if !spec.is_user_settable() || spec.local {
            continue;
        }
        if purpose == Purpose::Update && !spec.updatable {
            continue;
        }
        let Some(value) = record.get(spec.name).filter(|v| v.is_present()) else {
            continue;
        };
        body.insert(
            spec.remote_name.clone(),
            value_to_json(descriptor.kind(), spec, value, spec.name, Keys::Remote)?,
        );
    }
    Ok(Json::Object(body))
}

/// Full remote representation of a record: every non-local attribute with a
/// known, non-null value, computed ones included.
pub fn encode_remote(descriptor: &ResourceDescriptor, record: &Record) -> Result<Json> {
    object_to_json(
        descriptor.kind(),
        descriptor.attributes(),
        record,
        "",
        Keys::Remote,
    )
}

/// Render a record as a document keyed by attribute name.
///
/// Unknown values are left out; null values are kept as JSON null.
pub fn to_document(descriptor: &ResourceDescriptor, record: &Record) -> Result<Json> {
    object_to_json(
        descriptor.kind(),
        descriptor.attributes(),
        record,
        "",
        Keys::Attribute,
    )
}

/// Parse a document keyed by attribute name.
///
/// Attributes absent from the document stay absent from the record, so the
/// result can serve as desired configuration. Every type problem is
/// reported, not just the first.
pub fn from_document(
    descriptor: &ResourceDescriptor,
    doc: &Json,
) -> std::result::Result<Record, Vec<Violation>> {
    let Json::Object(object) = doc else {
        return Err(vec![Violation::new(
            descriptor.kind(),
            format!("expected a table, got {}", json_type(doc)),
        )]);
    };
    let mut violations = Vec::new();
    let record = document_object(descriptor.attributes(), object, "", &mut violations);
    if violations.is_empty() {
        Ok(record)
    } else {
        Err(violations)
    }
}

fn document_object(
    specs: &[AttributeSpec],
    object: &Map<String, Json>,
    prefix: &str,
    violations: &mut Vec<Violation>,
) -> Record {
    let mut record = Record::new();
    for (name, raw) in object {
        let path = join_path(prefix, name);
        let Some(spec) = specs.iter().find(|s| s.name == name) else {
            violations.push(Violation::new(path, "unsupported attribute"));
            continue;
        };
        if let Some(value) = document_value(spec, raw, &path, violations) {
            record.set(spec.name, value);
        }
    }
    record
}

fn document_value(
    spec: &AttributeSpec,
    raw: &Json,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Option<Value> {
    let mismatch = || {
        Violation::new(
            path,
            format!("expected {}, got {}", spec.attr_type.name(), json_type(raw)),
        )
    };

    if raw.is_null() {
        return Some(Value::Null);
    }

    match &spec.attr_type {
        AttrType::String => match raw.as_str() {
            Some(s) => Some(Value::string(s)),
            None => {
                violations.push(mismatch());
                None
            }
        },
        AttrType::Bool => match raw.as_bool() {
            Some(b) => Some(Value::Bool(b)),
            None => {
                violations.push(mismatch());
                None
            }
        },
        AttrType::Int32 => match json_integer(raw).map(i32::try_from) {
            Some(Ok(n)) => Some(Value::Int32(n)),
            Some(Err(_)) => {
                violations.push(Violation::new(path, "value does not fit in int32"));
                None
            }
            None => {
                violations.push(mismatch());
                None
            }
        },
        AttrType::Int64 => match json_integer(raw).map(i64::try_from) {
            Some(Ok(n)) => Some(Value::Int64(n)),
            Some(Err(_)) => {
                violations.push(Violation::new(path, "value does not fit in int64"));
                None
            }
            None => {
                violations.push(mismatch());
                None
            }
        },
        AttrType::Object(nested) => match raw.as_object() {
            Some(object) => Some(Value::Object(document_object(
                nested, object, path, violations,
            ))),
            None => {
                violations.push(mismatch());
                None
            }
        },
        AttrType::List(nested) => match raw.as_array() {
            Some(items) => {
                let mut records = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    match item.as_object() {
                        Some(object) => {
                            records.push(document_object(nested, object, &item_path, violations));
                        }
                        None => violations.push(Violation::new(
                            item_path,
                            format!("expected object, got {}", json_type(item)),
                        )),
                    }
                }
                Some(Value::List(records))
            }
            None => {
                violations.push(mismatch());
                None
            }
        },
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Keys {
    Remote,
    Attribute,
}

fn object_to_json(
    kind: &str,
    specs: &[AttributeSpec],
    record: &Record,
    prefix: &str,
    keys: Keys,
) -> Result<Json> {
    let mut object = Map::new();
    for spec in specs {
        if keys == Keys::Remote && spec.local {
            continue;
        }
        let Some(value) = record.get(spec.name) else {
            continue;
        };
        let key = match keys {
            Keys::Remote => spec.remote_name.clone(),
            Keys::Attribute => spec.name.to_string(),
        };
        match value {
            Value::Unknown => {}
            Value::Null if keys == Keys::Remote => {}
            _ => {
                let path = join_path(prefix, spec.name);
                object.insert(key, value_to_json(kind, spec, value, &path, keys)?);
            }
        }
    }
    Ok(Json::Object(object))
}

fn value_to_json(
    kind: &str,
    spec: &AttributeSpec,
    value: &Value,
    path: &str,
    keys: Keys,
) -> Result<Json> {
    let mismatch = || {
        EngineError::mapping(
            kind,
            path,
            format!("expected {}, got {}", spec.attr_type.name(), value.type_name()),
        )
    };

    match (&spec.attr_type, value) {
        (_, Value::Null) => Ok(Json::Null),
        (AttrType::String, Value::String(s)) => Ok(Json::String(s.clone())),
        (AttrType::Bool, Value::Bool(b)) => Ok(Json::Bool(*b)),
        (AttrType::Int32, Value::Int32(n)) => Ok(Json::from(*n)),
        (AttrType::Int64, Value::Int64(n)) => Ok(Json::from(*n)),
        (AttrType::Object(nested), Value::Object(record)) => {
            object_to_json(kind, nested, record, path, keys)
        }
        (AttrType::List(nested), Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| object_to_json(kind, nested, item, &format!("{}[{}]", path, i), keys))
            .collect::<Result<Vec<_>>>()
            .map(Json::Array),
        _ => Err(mismatch()),
    }
}

/// Restore values the remote object cannot be trusted with.
///
/// For each attribute of `decoded`:
/// - sensitive or local: the caller's value wins when it is known and
///   non-null (desired on create and update, prior on read);
/// - computed-once, at any depth: the prior value wins when known and
///   non-null. List items are paired with prior items by index.
pub fn merge_preserved(
    descriptor: &ResourceDescriptor,
    decoded: &mut Record,
    caller: &Record,
    prior: Option<&Record>,
) {
    merge_specs(descriptor.attributes(), decoded, Some(caller), prior);
}

fn merge_specs(
    specs: &[AttributeSpec],
    decoded: &mut Record,
    caller: Option<&Record>,
    prior: Option<&Record>,
) {
    for spec in specs {
        if spec.sensitive || spec.local {
            if let Some(value) = caller
                .and_then(|c| c.get(spec.name))
                .filter(|v| v.is_present())
            {
                decoded.set(spec.name, value.clone());
            }
            continue;
        }

        if spec.mutability == Mutability::ComputedOnce {
            if let Some(value) = prior
                .and_then(|p| p.get(spec.name))
                .filter(|v| v.is_present())
            {
                decoded.set(spec.name, value.clone());
            }
            continue;
        }

        // Objects may hold computed-once fields of their own
        if let AttrType::Object(nested) = &spec.attr_type {
            let prior_nested = prior.and_then(|p| p.get(spec.name)).and_then(Value::as_object);
            if let (Some(prior_nested), Some(Value::Object(current))) =
                (prior_nested, decoded.get(spec.name))
            {
                let mut current = current.clone();
                merge_specs(nested, &mut current, None, Some(prior_nested));
                decoded.set(spec.name, Value::Object(current));
            }
        }

        // List items are matched to prior items by position
        if let AttrType::List(nested) = &spec.attr_type {
            let prior_items = prior.and_then(|p| p.get(spec.name)).and_then(Value::as_list);
            if let (Some(prior_items), Some(Value::List(current))) =
                (prior_items, decoded.get(spec.name))
            {
                let items = current
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let mut item = item.clone();
                        merge_specs(nested, &mut item, None, prior_items.get(i));
                        item
                    })
                    .collect();
                decoded.set(spec.name, Value::List(items));
            }
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn json_type(raw: &Json) -> &'static str {
    match raw {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_f64() => "float",
        Json::Number(_) => "integer",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
