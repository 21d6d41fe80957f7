//! Manifest text → API objects
//!
//! Completion text is tolerated in the shapes models commonly produce: a
//! Markdown fence (possibly after a line of prose), several `---` separated
//! documents, empty documents, and `kind: List` wrappers.

use serde_json::Value;

use crate::types::{AssistError, Result};

/// One object ready to apply
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestObject {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub body: Value,
}

impl ManifestObject {
    fn from_value(body: Value, position: usize) -> Result<Self> {
        let field = |pointer: &str| {
            body.pointer(pointer)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };

        let missing =
            |what: &str| AssistError::ManifestParse(format!("object {} is missing {}", position, what));

        let api_version = field("/apiVersion").ok_or_else(|| missing("apiVersion"))?;
        let kind = field("/kind").ok_or_else(|| missing("kind"))?;
        let name = field("/metadata/name").ok_or_else(|| missing("metadata.name"))?;
        let namespace = field("/metadata/namespace");

        Ok(Self {
            api_version,
            kind,
            name,
            namespace,
            body,
        })
    }
}

/// Parse manifest text into the objects it declares, in document order
pub fn parse_manifests(text: &str) -> Result<Vec<ManifestObject>> {
    let text = strip_code_fence(text);
    let mut objects = Vec::new();

    for document in split_documents(text) {
        let value: Value = serde_yaml::from_str(document)
            .map_err(|e| AssistError::ManifestParse(format!("invalid YAML: {}", e)))?;

        match value {
            Value::Null => continue,
            Value::Object(_) if is_list(&value) => {
                let items = value
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for item in items {
                    let position = objects.len() + 1;
                    objects.push(ManifestObject::from_value(item, position)?);
                }
            }
            Value::Object(_) => {
                let position = objects.len() + 1;
                objects.push(ManifestObject::from_value(value, position)?);
            }
            other => {
                return Err(AssistError::ManifestParse(format!(
                    "expected a mapping, found {}",
                    describe(&other)
                )));
            }
        }
    }

    if objects.is_empty() {
        return Err(AssistError::ManifestParse(
            "manifest contains no objects".to_string(),
        ));
    }

    Ok(objects)
}

/// Split on `---` separator lines, dropping documents with no content
fn split_documents(text: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim_end() == "---" {
            documents.push(&text[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    documents.push(&text[start..]);

    documents
        .into_iter()
        .filter(|doc| {
            doc.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#') && line != "..."
            })
        })
        .collect()
}

fn is_list(value: &Value) -> bool {
    value.get("kind").and_then(Value::as_str) == Some("List")
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "nothing",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "plain text",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Body of the first ```…``` block (with optional language tag), wherever it
/// appears; text without a fence is returned as is
fn strip_code_fence(text: &str) -> &str {
    let Some(open) = fence_at_line_start(text) else {
        return text;
    };

    // drop the info string (e.g. "yaml")
    let body = text[open + 3..]
        .split_once('\n')
        .map(|(_, body)| body)
        .unwrap_or("");
    match fence_at_line_start(body) {
        Some(close) => body[..close].trim_end(),
        None => body.trim_end(),
    }
}

fn fence_at_line_start(text: &str) -> Option<usize> {
    text.match_indices("```")
        .map(|(i, _)| i)
        .find(|&i| text[..i].rsplit('\n').next().is_some_and(|prefix| prefix.trim().is_empty()))
}
