// ── Cache keys ──
//
// A cache key is (resource, normalised argument). Normalisation makes two
// structurally equal arguments produce the same key regardless of field
// order or explicit nulls, and rejects anything the resource can't accept.

use std::collections::BTreeMap;
use std::fmt;

use ootb_api::Request;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::CoreError;
use crate::registry::{ArgumentShape, Resource, describe};

/// Canonical form of a read argument: sorted scalar query fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedArg(BTreeMap<String, String>);

impl NormalizedArg {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// The unit of caching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    resource: Resource,
    arg: NormalizedArg,
}

impl CacheKey {
    /// Validate `arg` against the resource's argument shape and normalise it.
    pub fn new(resource: Resource, arg: &Value) -> Result<Self, CoreError> {
        let arg = normalize(resource, arg)?;
        Ok(Self { resource, arg })
    }

    /// Key for a resource read without an argument.
    pub fn bare(resource: Resource) -> Self {
        Self {
            resource,
            arg: NormalizedArg::default(),
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn arg(&self) -> &NormalizedArg {
        &self.arg
    }

    /// The GET request that fetches this key.
    pub fn request(&self) -> Request {
        Request::get(describe(self.resource).path).with_query(self.arg.query_pairs())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        let mut sep = '?';
        for (k, v) in &self.arg.0 {
            write!(f, "{sep}{k}={v}")?;
            sep = '&';
        }
        Ok(())
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn normalize(resource: Resource, arg: &Value) -> Result<NormalizedArg, CoreError> {
    let invalid = |reason: String| CoreError::InvalidArgument { resource, reason };

    let fields = match arg {
        Value::Null => return Ok(NormalizedArg::default()),
        Value::Object(map) => map,
        other => return Err(invalid(format!("expected an object, got {other}"))),
    };

    let allowed: &[&str] = match describe(resource).argument {
        ArgumentShape::None => &[],
        ArgumentShape::Query(allowed) => allowed,
    };

    let mut normalized = BTreeMap::new();
    for (field, value) in fields {
        let rendered = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(invalid(format!("field `{field}` must be a scalar")));
            }
        };
        if !allowed.contains(&field.as_str()) {
            return Err(invalid(format!("unknown field `{field}`")));
        }
        normalized.insert(field.clone(), rendered);
    }
    Ok(NormalizedArg(normalized))
}
