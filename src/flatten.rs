use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::data::{Document, Value};

pub type FlatDocument = BTreeMap<String, Value>;

pub const LIST_MARKER: &str = "[]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    pub separator: String,
    /// Emit `path[i]` entries plus a `path[]` marker for every array. When
    /// disabled, arrays are kept whole under their own path.
    pub expand_arrays: bool,
    /// Containers deeper than this are emitted as `nested` leaves.
    pub max_depth: usize,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            separator: String::from("."),
            expand_arrays: true,
            max_depth: 64,
        }
    }
}

impl FlattenConfig {
    pub fn keys_only() -> Self {
        FlattenConfig {
            expand_arrays: false,
            ..FlattenConfig::default()
        }
    }

    fn join(&self, parent: &str, key: &str) -> String {
        if parent.is_empty() {
            key.to_string()
        } else {
            format!("{parent}{}{key}", self.separator)
        }
    }
}

struct Frame<'a> {
    path: String,
    value: &'a Value,
    depth: usize,
}

pub fn flatten(doc: &Document, config: &FlattenConfig) -> FlatDocument {
    let mut out = FlatDocument::new();
    let mut stack: Vec<Frame<'_>> = doc
        .iter()
        .rev()
        .map(|(key, value)| Frame {
            path: key.clone(),
            value,
            depth: 1,
        })
        .collect();

    while let Some(Frame { path, value, depth }) = stack.pop() {
        let expandable = match value {
            Value::Document(_) => true,
            Value::Array(_) => config.expand_arrays,
            _ => false,
        };
        if expandable && depth > config.max_depth {
            warn!(
                "Field '{path}' nests deeper than {} levels; keeping it as a nested value",
                config.max_depth
            );
            emit(&mut out, path, value.clone());
            continue;
        }
        match value {
            Value::Document(inner) => {
                for (key, child) in inner.iter().rev() {
                    stack.push(Frame {
                        path: config.join(&path, key),
                        value: child,
                        depth: depth + 1,
                    });
                }
            }
            Value::Array(items) if config.expand_arrays => {
                emit(&mut out, format!("{path}{LIST_MARKER}"), Value::Boolean(true));
                for (idx, item) in items.iter().enumerate().rev() {
                    stack.push(Frame {
                        path: format!("{path}[{idx}]"),
                        value: item,
                        depth: depth + 1,
                    });
                }
            }
            _ => emit(&mut out, path, value.clone()),
        }
    }
    out
}

fn emit(out: &mut FlatDocument, path: String, value: Value) {
    if path.is_empty() {
        return;
    }
    out.insert(path, value);
}
