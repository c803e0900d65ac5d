//! State patch application.
//!
//! `STATE_DELTA` events carry a list of JSON-Patch-shaped operations. Only
//! `add`, `replace` and `remove` are applied; every other operation is
//! skipped and reported back in [`PatchOutcome::skipped`] so callers can
//! surface it.
//!
//! Application always works on a deep copy of the input snapshot, so each
//! delta costs O(size of state).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PatchError;

/// Patch operation name.
///
/// Unknown names are preserved in [`PatchOpKind::Other`] rather than
/// rejected at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PatchOpKind {
    Add,
    Replace,
    Remove,
    Move,
    Copy,
    Test,
    Other(String),
}

impl PatchOpKind {
    pub fn as_str(&self) -> &str {
        match self {
            PatchOpKind::Add => "add",
            PatchOpKind::Replace => "replace",
            PatchOpKind::Remove => "remove",
            PatchOpKind::Move => "move",
            PatchOpKind::Copy => "copy",
            PatchOpKind::Test => "test",
            PatchOpKind::Other(name) => name,
        }
    }

    /// Whether [`apply_patch`] acts on this operation.
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            PatchOpKind::Add | PatchOpKind::Replace | PatchOpKind::Remove
        )
    }
}

impl From<String> for PatchOpKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "add" => PatchOpKind::Add,
            "replace" => PatchOpKind::Replace,
            "remove" => PatchOpKind::Remove,
            "move" => PatchOpKind::Move,
            "copy" => PatchOpKind::Copy,
            "test" => PatchOpKind::Test,
            _ => PatchOpKind::Other(value),
        }
    }
}

impl From<PatchOpKind> for String {
    fn from(value: PatchOpKind) -> Self {
        match value {
            PatchOpKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// A single patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOpKind,
    /// Slash-delimited pointer to the target.
    pub path: String,
    /// Value for `add`/`replace`. A missing value is treated as `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Source pointer for `move`/`copy`. Never read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Replace,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOpKind::Remove,
            path: path.into(),
            value: None,
            from: None,
        }
    }
}

/// Result of a successful [`apply_patch`].
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    /// The patched copy of the input snapshot.
    pub document: Value,
    /// Operations that were not applied, in input order.
    pub skipped: Vec<PatchOperation>,
}

/// Apply `operations` in order to a copy of `snapshot`.
///
/// The input is never mutated. A path whose intermediate segments do not
/// exist fails the whole patch; unsupported operations are skipped and the
/// remaining operations still run.
pub fn apply_patch(
    snapshot: &Value,
    operations: &[PatchOperation],
) -> Result<PatchOutcome, PatchError> {
    let mut document = snapshot.clone();
    let mut skipped = Vec::new();

    for operation in operations {
        match operation.op {
            PatchOpKind::Add | PatchOpKind::Replace => {
                let value = operation.value.clone().unwrap_or(Value::Null);
                set_path(&mut document, &operation.path, value)?;
            }
            PatchOpKind::Remove => remove_path(&mut document, &operation.path)?,
            _ => {
                log::warn!(
                    "skipping unsupported patch op '{}' at '{}'",
                    operation.op.as_str(),
                    operation.path
                );
                skipped.push(operation.clone());
            }
        }
    }

    Ok(PatchOutcome { document, skipped })
}

/// Split a pointer into unescaped segments, ignoring empty ones.
fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn set_path(document: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let segments = split_path(path);
    let Some((leaf, parents)) = segments.split_last() else {
        *document = value;
        return Ok(());
    };

    match walk(document, path, parents)? {
        Value::Object(map) => {
            map.insert(leaf.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let len = items.len();
            if leaf == "-" {
                items.push(value);
                return Ok(());
            }
            let index = parse_index(path, leaf)?;
            if index < len {
                items[index] = value;
            } else if index == len {
                items.push(value);
            } else {
                return Err(PatchError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len,
                });
            }
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
            segment: leaf.clone(),
        }),
    }
}

fn remove_path(document: &mut Value, path: &str) -> Result<(), PatchError> {
    let segments = split_path(path);
    let Some((leaf, parents)) = segments.split_last() else {
        *document = Value::Object(Map::new());
        return Ok(());
    };

    match walk(document, path, parents)? {
        Value::Object(map) => {
            map.remove(leaf);
        }
        // Leaves a hole so sibling indices stay put.
        Value::Array(items) => {
            if let Some(slot) = leaf.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *slot = Value::Null;
            }
        }
        _ => {
            return Err(PatchError::NotAContainer {
                path: path.to_string(),
                segment: leaf.clone(),
            })
        }
    }
    Ok(())
}

/// Follow `segments` from the root and return the container they point at.
fn walk<'a>(
    root: &'a mut Value,
    path: &str,
    segments: &[String],
) -> Result<&'a mut Value, PatchError> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => {
                map.get_mut(segment)
                    .ok_or_else(|| PatchError::PathNotFound {
                        path: path.to_string(),
                        segment: segment.clone(),
                    })?
            }
            Value::Array(items) => {
                let index = parse_index(path, segment)?;
                let len = items.len();
                items
                    .get_mut(index)
                    .ok_or_else(|| PatchError::IndexOutOfBounds {
                        path: path.to_string(),
                        index,
                        len,
                    })?
            }
            _ => {
                return Err(PatchError::NotAContainer {
                    path: path.to_string(),
                    segment: segment.clone(),
                })
            }
        };
    }
    Ok(current)
}

fn parse_index(path: &str, segment: &str) -> Result<usize, PatchError> {
    segment.parse().map_err(|_| PatchError::InvalidIndex {
        path: path.to_string(),
        segment: segment.to_string(),
    })
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
