use indexmap::IndexMap;

use crate::path::{FieldPath, SchemaError, PRIMARY_SECTION};

/// Ordered mapping from output column to the path its value is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSchema {
    columns: IndexMap<String, FieldPath>,
}

/// Field and expand parameters negotiated with the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPlan {
    pub fields: Vec<String>,
    pub expand: Vec<String>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FieldSchema::insert`].
    pub fn with(mut self, column: impl Into<String>, path: impl Into<FieldPath>) -> Self {
        self.insert(column, path);
        self
    }

    /// Declares a column. Redeclaring an existing column replaces its path in place.
    pub fn insert(&mut self, column: impl Into<String>, path: impl Into<FieldPath>) {
        self.columns.insert(column.into(), path.into());
    }

    /// Applies `overrides` on top of this schema; the override wins by column name.
    pub fn overlay(mut self, overrides: &FieldSchema) -> Self {
        for (column, path) in overrides.iter() {
            self.insert(column, path.clone());
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&FieldPath> {
        self.columns.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldPath)> {
        self.columns
            .iter()
            .map(|(column, path)| (column.as_str(), path))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        self.iter().try_for_each(|(column, path)| path.validate(column))
    }

    /// Splits declared paths into primary request fields and expand directives.
    ///
    /// Paths under [`PRIMARY_SECTION`] request their second key as a field.
    /// Single-key paths name attributes the service always returns. Any other
    /// root is requested as an expand section.
    pub fn partition(&self) -> RequestPlan {
        let mut plan = RequestPlan::default();
        for (_, path) in self.iter() {
            match path.keys() {
                [root, field, ..] if root == PRIMARY_SECTION => push_unique(&mut plan.fields, field),
                [_] | [] => {}
                [root, ..] => push_unique(&mut plan.expand, root),
            }
        }
        plan
    }
}

impl<C, P> FromIterator<(C, P)> for FieldSchema
where
    C: Into<String>,
    P: Into<FieldPath>,
{
    fn from_iter<T: IntoIterator<Item = (C, P)>>(iter: T) -> Self {
        let mut schema = Self::new();
        for (column, path) in iter {
            schema.insert(column, path);
        }
        schema
    }
}

impl RequestPlan {
    pub fn add_field(&mut self, field: &str) {
        push_unique(&mut self.fields, field);
    }

    pub fn add_expand(&mut self, section: &str) {
        push_unique(&mut self.expand, section);
    }

    pub fn fields_param(&self) -> String {
        self.fields.join(",")
    }

    pub fn expand_param(&self) -> String {
        self.expand.join(",")
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}
