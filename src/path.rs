use std::fmt;

use serde_json::Value;

/// Top-level section of a Jira issue that holds the negotiable fields.
pub const PRIMARY_SECTION: &str = "fields";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("field path for column '{column}' must contain at least one key")]
    EmptyPath { column: String },
    #[error("field path for column '{column}' has an empty key at position {position}")]
    EmptySegment { column: String, position: usize },
}

/// Ordered keys describing how to descend from a record root to a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    /// Path rooted at [`PRIMARY_SECTION`], e.g. `in_fields(["status", "name"])`
    /// is `fields.status.name`.
    pub fn in_fields<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut path = vec![PRIMARY_SECTION.to_string()];
        path.extend(keys.into_iter().map(Into::into));
        Self(path)
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn root(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the path is usable as a declaration for `column`.
    pub fn validate(&self, column: &str) -> Result<(), SchemaError> {
        if self.0.is_empty() {
            return Err(SchemaError::EmptyPath {
                column: column.to_string(),
            });
        }
        if let Some(position) = self.0.iter().position(|key| key.trim().is_empty()) {
            return Err(SchemaError::EmptySegment {
                column: column.to_string(),
                position,
            });
        }
        Ok(())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl<K: Into<String>, const N: usize> From<[K; N]> for FieldPath {
    fn from(keys: [K; N]) -> Self {
        Self::new(keys)
    }
}

impl From<Vec<String>> for FieldPath {
    fn from(keys: Vec<String>) -> Self {
        Self(keys)
    }
}

/// A container that can be descended into one key at a time.
pub trait Traverse {
    fn child(&self, key: &str) -> Option<&Self>;
}

impl Traverse for Value {
    fn child(&self, key: &str) -> Option<&Self> {
        match self {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        }
    }
}

/// Walks `path` from `root`; `None` as soon as a segment does not resolve.
pub fn lookup<'a, T: Traverse>(root: &'a T, path: &FieldPath) -> Option<&'a T> {
    path.keys()
        .iter()
        .try_fold(root, |current, key| current.child(key))
}

/// Resolves `path` against a record, yielding `Value::Null` on any miss.
pub fn resolve(root: &Value, path: &FieldPath) -> Value {
    lookup(root, path).cloned().unwrap_or(Value::Null)
}
