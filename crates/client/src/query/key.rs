//! Structural cache keys.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde_json::Value;

/// Ordered tuple `[domain_tag, ...params]` identifying a cached query.
///
/// Equality is by value: two keys built from deep-equal arguments are the
/// same key, whatever allocations they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
    /// Start a key with its domain tag.
    pub fn new(tag: &str) -> Self {
        Self(vec![Value::String(tag.to_string())])
    }

    /// Append one parameter. Values that cannot be represented as JSON
    /// become `null`.
    pub fn with<T: Serialize + ?Sized>(mut self, part: &T) -> Self {
        self.0.push(serde_json::to_value(part).unwrap_or(Value::Null));
        self
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    pub fn tag(&self) -> Option<&str> {
        self.0.first().and_then(Value::as_str)
    }

    /// True when `prefix` matches the leading parts of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for part in &self.0 {
            hash_value(part, state);
        }
    }
}

// Objects are hashed in sorted key order so the hash agrees with `Value`'s
// order-insensitive map equality.
fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            n.to_string().hash(state);
        }
        Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            for (k, v) in fields {
                k.hash(state);
                hash_value(v, state);
            }
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Array(self.0.clone()))
    }
}

/// Build a [`QueryKey`](crate::query::QueryKey): `query_key!["assignments", course_id, true]`.
#[macro_export]
macro_rules! query_key {
    ($tag:expr $(, $part:expr)* $(,)?) => {
        $crate::query::QueryKey::new($tag)$(.with(&$part))*
    };
}
