//! Flattening of raw issue records into output rows.
//!
//! Misses never fail: a column whose path does not resolve is written as
//! `null`, and a list path that does not resolve to an array expands to no
//! rows at all.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::path::{lookup, resolve, FieldPath};
use crate::schema::FieldSchema;

/// Column carrying the owning issue's identifier on fan-out rows.
pub const PARENT_COLUMN: &str = "issue";

/// One flat output record, columns in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OutputRow(IndexMap<String, Value>);

impl OutputRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Writes `parent` as the last column, replacing any nested value of the same name.
    fn tag_parent(mut self, parent: Value) -> Self {
        self.0.shift_remove(PARENT_COLUMN);
        self.0.insert(PARENT_COLUMN.to_string(), parent);
        self
    }
}

/// Default parent identifier: the issue key.
pub fn issue_key(record: &Value) -> Value {
    resolve(record, &FieldPath::from(["key"]))
}

pub fn extract(record: &Value, schema: &FieldSchema) -> OutputRow {
    OutputRow(
        schema
            .iter()
            .map(|(column, path)| (column.to_string(), resolve(record, path)))
            .collect(),
    )
}

/// Expands the list at `list_path` into one row per element, each tagged with
/// the parent identifier computed from `record`.
pub fn extract_list<'a, F>(
    record: &'a Value,
    list_path: &FieldPath,
    sub_schema: &'a FieldSchema,
    parent_id: F,
) -> impl Iterator<Item = OutputRow> + 'a
where
    F: Fn(&Value) -> Value + 'a,
{
    let parent = parent_id(record);
    list_items(record, list_path)
        .iter()
        .map(move |item| extract(item, sub_schema).tag_parent(parent.clone()))
}

/// Expands raw sub-entries fetched separately from `record` (worklogs, SLA).
pub fn extract_entries<'a>(
    parent: Value,
    entries: Vec<Value>,
    schema: &'a FieldSchema,
) -> impl Iterator<Item = OutputRow> + 'a {
    entries
        .into_iter()
        .map(move |entry| extract(&entry, schema).tag_parent(parent.clone()))
}

/// Schemas and filter for changelog fan-out.
#[derive(Debug, Clone, Copy)]
pub struct HistorySpec<'a> {
    /// Changelog item `field` value to keep, e.g. `status`.
    pub field: &'a str,
    pub history_fields: &'a FieldSchema,
    pub item_fields: &'a FieldSchema,
}

/// Emits one row per changelog item whose `field` matches `spec.field`.
///
/// Row columns are the history entry columns, then the item columns, then the
/// parent issue key.
pub fn extract_history<'a>(
    record: &'a Value,
    spec: HistorySpec<'a>,
) -> impl Iterator<Item = OutputRow> + 'a {
    let parent = issue_key(record);
    let histories = list_items(record, &FieldPath::from(["changelog", "histories"]));

    histories.iter().flat_map(move |history| {
        let parent = parent.clone();
        list_items(history, &FieldPath::from(["items"]))
            .iter()
            .filter(move |item| item.get("field").and_then(Value::as_str) == Some(spec.field))
            .map(move |item| {
                let mut row = extract(history, spec.history_fields);
                for (column, path) in spec.item_fields.iter() {
                    row.insert(column, resolve(item, path));
                }
                row.tag_parent(parent.clone())
            })
    })
}

fn list_items<'a>(record: &'a Value, path: &FieldPath) -> &'a [Value] {
    lookup(record, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
