//! Safety-restricted YAML loading.
//!
//! [`load`] turns document text into a plain [`Node`] tree. It refuses
//! anchors, aliases, tags and merge keys, and bounds input size and nesting.
//! The marker scan runs before the YAML parser sees the text; the conversion
//! from the parser's value tree re-checks every rule structurally.

mod node;
mod scan;

pub use node::Node;

use serde_yaml_ng::Value;
use tracing::{debug, instrument};

use crate::config::Limits;
use crate::error::{Error, Result, SafetyError};

/// Parse text into a structural tree, enforcing the safety rules.
///
/// Either the complete tree is returned or an error; never a partial tree.
#[instrument(skip_all, fields(bytes = text.len()))]
pub fn load(text: &str, limits: &Limits) -> Result<Node> {
    if text.len() > limits.max_input_bytes {
        return Err(SafetyError::InputTooLarge {
            size: text.len(),
            limit: limits.max_input_bytes,
        }
        .into());
    }

    scan::scan(text, limits.max_depth)?;

    let value: Value = serde_yaml_ng::from_str(text).map_err(|e| Error::Yaml(e.to_string()))?;

    let converter = Converter {
        max_depth: limits.max_depth,
    };
    let node = converter.convert(&value, "", 0)?;
    debug!(depth = node.depth(), kind = node.kind_name(), "loaded document");
    Ok(node)
}

struct Converter {
    max_depth: usize,
}

impl Converter {
    fn convert(&self, value: &Value, path: &str, depth: usize) -> Result<Node> {
        match value {
            Value::Null => Ok(Node::Null),
            Value::Bool(b) => Ok(Node::Bool(*b)),
            Value::Number(n) => Ok(match n.as_i64() {
                Some(v) => Node::Int(v),
                None => Node::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Ok(Node::Str(s.clone())),
            Value::Tagged(_) => Err(SafetyError::Tag { at: display_path(path) }.into()),
            Value::Sequence(items) => {
                let depth = self.enter(depth)?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.convert(item, &format!("{path}[{i}]"), depth))
                    .collect::<Result<Vec<_>>>()
                    .map(Node::Seq)
            }
            Value::Mapping(mapping) => {
                let depth = self.enter(depth)?;
                let mut entries = Vec::with_capacity(mapping.len());
                for (key, val) in mapping {
                    let key = self.key_text(key, path)?;
                    if key == "<<" {
                        return Err(SafetyError::MergeKey { at: display_path(path) }.into());
                    }
                    let child = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    let node = self.convert(val, &child, depth)?;
                    entries.push((key, node));
                }
                Ok(Node::Map(entries))
            }
        }
    }

    fn enter(&self, depth: usize) -> Result<usize> {
        let depth = depth + 1;
        if depth > self.max_depth {
            return Err(SafetyError::NestingTooDeep {
                depth,
                limit: self.max_depth,
            }
            .into());
        }
        Ok(depth)
    }

    #[allow(clippy::unused_self)]
    fn key_text(&self, key: &Value, path: &str) -> Result<String> {
        match key {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok("null".to_string()),
            Value::Tagged(_) => Err(SafetyError::Tag { at: display_path(path) }.into()),
            Value::Sequence(_) | Value::Mapping(_) => Err(SafetyError::NonScalarKey {
                path: display_path(path),
            }
            .into()),
        }
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "document root".to_string()
    } else {
        path.to_string()
    }
}
