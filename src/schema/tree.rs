//! Schema document tree with typed, path-tracking accessors

use serde_json::{Map, Value};

use crate::types::{AssistError, Result};

/// A cluster's OpenAPI v2 document, fetched fresh for each resolution
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    root: Value,
}

impl SchemaDocument {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Parse a raw payload; anything that is not well-formed JSON is unavailable
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map(Self::new)
            .map_err(|e| AssistError::SchemaUnavailable(format!("schema is not valid JSON: {}", e)))
    }

    pub fn root(&self) -> SchemaNode<'_> {
        SchemaNode {
            path: String::new(),
            value: &self.root,
        }
    }
}

/// Borrowed view of a sub-tree, remembering how it was reached
#[derive(Debug, Clone)]
pub struct SchemaNode<'a> {
    path: String,
    value: &'a Value,
}

impl<'a> SchemaNode<'a> {
    /// Dotted path from the document root; empty for the root itself
    pub fn path(&self) -> &str {
        if self.path.is_empty() { "<root>" } else { &self.path }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn as_mapping(&self) -> Result<&'a Map<String, Value>> {
        self.value
            .as_object()
            .ok_or_else(|| AssistError::schema_shape(self.path(), "expected a mapping"))
    }

    pub fn as_str(&self) -> Result<&'a str> {
        self.value
            .as_str()
            .ok_or_else(|| AssistError::schema_shape(self.path(), "expected a string"))
    }

    /// Child under `key`; a missing key is a shape error at the child's path
    pub fn child(&self, key: &str) -> Result<SchemaNode<'a>> {
        let path = self.child_path(key);
        let value = self
            .as_mapping()?
            .get(key)
            .ok_or_else(|| AssistError::schema_shape(&path, "missing key"))?;
        Ok(SchemaNode { path, value })
    }

    /// Child under `key`, `None` when absent
    pub fn get(&self, key: &str) -> Result<Option<SchemaNode<'a>>> {
        Ok(self.as_mapping()?.get(key).map(|value| SchemaNode {
            path: self.child_path(key),
            value,
        }))
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }
}

/// Schema sub-tree for one resource kind
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSchemaFragment {
    pub kind: String,
    pub body: Value,
}

impl ResourceSchemaFragment {
    /// Render as compact JSON with `description` fields removed, cut to `max_chars`
    pub fn render(&self, max_chars: usize) -> String {
        let mut body = self.body.clone();
        prune_descriptions(&mut body);

        let rendered = serde_json::to_string(&body).unwrap_or_default();
        if rendered.chars().count() <= max_chars {
            return rendered;
        }
        let mut truncated: String = rendered.chars().take(max_chars).collect();
        truncated.push_str(" ...");
        truncated
    }
}

fn prune_descriptions(value: &mut Value) {
    match value {
        Value::Object(map) => {
            // a property may itself be named "description"
            if matches!(map.get("description"), Some(Value::String(_))) {
                map.remove("description");
            }
            map.values_mut().for_each(prune_descriptions);
        }
        Value::Array(items) => items.iter_mut().for_each(prune_descriptions),
        _ => {}
    }
}
