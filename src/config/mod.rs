//! Configuration document loading.
//!
//! A document has two optional top-level fields:
//!
//! - `vscode`: one binary specification or a sequence of them
//!   (`platform` required, `build` default `stable`, `version` default `latest`);
//! - `extensions`: an arbitrarily nested mapping whose string leaves are
//!   extension ids (optionally pinned as `publisher.name@1.2.3`).
//!
//! ```
//! use vscod_core::config::ConfigDocument;
//!
//! let doc = ConfigDocument::from_json_str(
//!     r#"{"vscode": {"platform": "linux-deb-x64"}, "extensions": {"rust": "rust-lang.rust-analyzer"}}"#,
//! )
//! .unwrap();
//! assert_eq!(doc.binaries.len(), 1);
//! ```

mod error;

pub use error::ConfigError;

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::download::is_safe_path_segment;

/// Separator between an extension id and its pinned version in a leaf.
pub const VERSION_SEPARATOR: char = '@';

/// Raw binary specification as written in the document.
///
/// Field validation happens in the walker so errors can name the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BinarySpec {
    /// Platform wire string (required).
    #[serde(default)]
    pub platform: Option<String>,
    /// Build channel; `stable` when absent.
    #[serde(default)]
    pub build: Option<String>,
    /// Version token; `latest` when absent.
    #[serde(default)]
    pub version: Option<String>,
}

impl BinarySpec {
    /// Creates a fully specified binary entry.
    #[must_use]
    pub fn new(platform: &str, build: &str, version: &str) -> Self {
        Self {
            platform: Some(platform.to_string()),
            build: Some(build.to_string()),
            version: Some(version.to_string()),
        }
    }
}

/// `vscode` accepts either a bare mapping or a sequence.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BinarySection {
    Many(Vec<BinarySpec>),
    One(BinarySpec),
}

impl BinarySection {
    fn into_specs(self) -> Vec<BinarySpec> {
        match self {
            Self::Many(specs) => specs,
            Self::One(spec) => vec![spec],
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    vscode: Option<BinarySection>,
    #[serde(default)]
    extensions: Option<Value>,
}

/// Node of the extensions tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNode {
    /// Extension id (optionally `@version`) to download at this position.
    Leaf(String),
    /// Named children in document order.
    Branch(Vec<(String, ConfigNode)>),
}

impl ConfigNode {
    /// An empty branch.
    #[must_use]
    pub fn empty() -> Self {
        Self::Branch(Vec::new())
    }

    /// Builds a tree from a JSON value, validating keys and leaf types.
    ///
    /// `path` is the key path of `value`, used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for empty leaves, non-string non-mapping
    /// values, and keys that cannot be used as directory names.
    pub fn from_value(value: &Value, path: &str) -> Result<Self, ConfigError> {
        match value {
            Value::String(leaf) if leaf.trim().is_empty() => Err(ConfigError::EmptyLeaf {
                path: path.to_string(),
            }),
            Value::String(leaf) => Ok(Self::Leaf(leaf.trim().to_string())),
            Value::Object(map) => {
                let mut children = Vec::with_capacity(map.len());
                for (key, child) in map {
                    if !is_safe_path_segment(key) {
                        return Err(ConfigError::InvalidSegment {
                            path: path.to_string(),
                            segment: key.clone(),
                        });
                    }
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    children.push((key.clone(), Self::from_value(child, &child_path)?));
                }
                Ok(Self::Branch(children))
            }
            other => Err(ConfigError::InvalidNodeType {
                path: path.to_string(),
                found: json_type_name(other),
            }),
        }
    }

    /// Number of leaves below this node.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            match node {
                Self::Leaf(_) => count += 1,
                Self::Branch(children) => pending.extend(children.iter().map(|(_, c)| c)),
            }
        }
        count
    }
}

/// A parsed configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    /// Binary specifications, normalized to a sequence.
    pub binaries: Vec<BinarySpec>,
    /// Root of the extensions tree; always a branch.
    pub extensions: ConfigNode,
}

impl ConfigDocument {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and the structural
    /// errors of [`ConfigNode::from_value`] for the extensions tree.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawDocument =
            serde_json::from_str(input).map_err(|source| ConfigError::Parse { source })?;

        let binaries = raw.vscode.map(BinarySection::into_specs).unwrap_or_default();
        let extensions = match raw.extensions {
            None | Some(Value::Null) => ConfigNode::empty(),
            Some(value @ Value::Object(_)) => ConfigNode::from_value(&value, "")?,
            Some(other) => {
                return Err(ConfigError::InvalidNodeType {
                    path: "extensions".to_string(),
                    found: json_type_name(&other),
                });
            }
        };

        debug!(
            binaries = binaries.len(),
            extensions = extensions.leaf_count(),
            "parsed config document"
        );
        Ok(Self {
            binaries,
            extensions,
        })
    }

    /// Reads and parses a JSON document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// the errors of [`from_json_str`](Self::from_json_str).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        Self::from_json_str(&input)
    }

    /// Builds a document that places each extension in a directory named
    /// after its id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an id is empty or unusable as a directory name.
    pub fn from_extension_ids<S: AsRef<str>>(ids: &[S]) -> Result<Self, ConfigError> {
        let mut children = Vec::with_capacity(ids.len());
        for raw in ids {
            let raw = raw.as_ref().trim();
            let id = raw.split(VERSION_SEPARATOR).next().unwrap_or(raw);
            if raw.is_empty() {
                return Err(ConfigError::EmptyLeaf {
                    path: "<command line>".to_string(),
                });
            }
            if !is_safe_path_segment(id) {
                return Err(ConfigError::InvalidSegment {
                    path: "<command line>".to_string(),
                    segment: id.to_string(),
                });
            }
            children.push((id.to_string(), ConfigNode::Leaf(raw.to_string())));
        }
        Ok(Self {
            binaries: Vec::new(),
            extensions: ConfigNode::Branch(children),
        })
    }

    /// Builds a document holding only binary specifications.
    #[must_use]
    pub fn from_binary_specs(binaries: Vec<BinarySpec>) -> Self {
        Self {
            binaries,
            extensions: ConfigNode::empty(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}
