//! Flattens a configuration document into download tasks.
//!
//! The extensions tree is traversed iteratively with an explicit stack so
//! nesting depth is bounded only by memory, and siblings are visited in
//! document order so the output layout is reproducible.
//!
//! Cycles: [`ConfigNode`] is an owned tree built from a JSON document, which
//! cannot encode shared or cyclic references, so the walk always terminates.

use std::collections::HashSet;
use std::slice;

use tracing::{debug, warn};

use crate::artifact::{
    ArtifactDescriptor, BinaryRef, Build, DownloadTask, ExtensionId, ExtensionRef, Platform,
    Version,
};
use crate::config::{BinarySpec, ConfigDocument, ConfigError, ConfigNode, VERSION_SEPARATOR};

/// Lazy iterator over the extension tasks of a tree.
///
/// Yields one `Result` per leaf; malformed leaves surface as errors at their
/// position in the walk.
#[derive(Debug)]
pub struct ExtensionWalk<'a> {
    /// Leaf passed directly as the walk root.
    root_leaf: Option<(&'a str, Vec<String>)>,
    stack: Vec<Frame<'a>>,
}

#[derive(Debug)]
struct Frame<'a> {
    prefix: Vec<String>,
    children: slice::Iter<'a, (String, ConfigNode)>,
}

impl<'a> Iterator for ExtensionWalk<'a> {
    type Item = Result<DownloadTask, ConfigError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((leaf, path)) = self.root_leaf.take() {
            return Some(extension_task(leaf, path));
        }

        loop {
            let frame = self.stack.last_mut()?;
            let Some((key, child)) = frame.children.next() else {
                self.stack.pop();
                continue;
            };

            let mut path = frame.prefix.clone();
            path.push(key.clone());
            match child {
                ConfigNode::Leaf(leaf) => return Some(extension_task(leaf, path)),
                ConfigNode::Branch(children) => self.stack.push(Frame {
                    prefix: path,
                    children: children.iter(),
                }),
            }
        }
    }
}

/// Walks an extensions tree from the root.
#[must_use]
pub fn walk_extensions(root: &ConfigNode) -> ExtensionWalk<'_> {
    walk_extensions_from(root, Vec::new())
}

/// Walks an extensions tree whose root sits at `path_prefix`.
#[must_use]
pub fn walk_extensions_from(node: &ConfigNode, path_prefix: Vec<String>) -> ExtensionWalk<'_> {
    match node {
        ConfigNode::Leaf(leaf) => ExtensionWalk {
            root_leaf: Some((leaf.as_str(), path_prefix)),
            stack: Vec::new(),
        },
        ConfigNode::Branch(children) => ExtensionWalk {
            root_leaf: None,
            stack: vec![Frame {
                prefix: path_prefix,
                children: children.iter(),
            }],
        },
    }
}

/// Parses a leaf value into an extension request.
///
/// `publisher.name@1.2.3` pins the version; a bare id means latest.
///
/// # Errors
///
/// Returns [`ConfigError`] for malformed ids and blank pinned versions.
pub fn parse_extension_leaf(leaf: &str) -> Result<ExtensionRef, ConfigError> {
    let (id, version) = match leaf.split_once(VERSION_SEPARATOR) {
        Some((id, version)) => (id.trim(), Version::parse(version, leaf)?),
        None => (leaf.trim(), Version::Latest),
    };
    Ok(ExtensionRef {
        extension_id: ExtensionId::parse(id)?,
        version,
    })
}

fn extension_task(leaf: &str, destination_path: Vec<String>) -> Result<DownloadTask, ConfigError> {
    let extension = parse_extension_leaf(leaf)?;
    Ok(DownloadTask {
        destination_path,
        descriptor: ArtifactDescriptor::Extension(extension),
    })
}

/// Validates binary specifications and turns each into a task under a
/// directory named after its platform.
///
/// Exact duplicates are dropped so two writers never race on one path.
///
/// # Errors
///
/// Returns [`ConfigError::MissingPlatform`] when an entry has no platform and
/// [`ConfigError::UnknownPlatform`]/[`ConfigError::UnknownBuild`] for values
/// outside the supported sets.
pub fn walk_binaries(specs: &[BinarySpec]) -> Result<Vec<DownloadTask>, ConfigError> {
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(specs.len());

    for (index, spec) in specs.iter().enumerate() {
        let binary = binary_ref(index, spec)?;
        if !seen.insert(binary.clone()) {
            warn!(
                platform = %binary.platform,
                build = %binary.build,
                version = %binary.version,
                "ignoring duplicate binary specification"
            );
            continue;
        }
        tasks.push(DownloadTask {
            destination_path: vec![binary.platform.as_str().to_string()],
            descriptor: ArtifactDescriptor::Binary(binary),
        });
    }
    Ok(tasks)
}

fn binary_ref(index: usize, spec: &BinarySpec) -> Result<BinaryRef, ConfigError> {
    let platform = spec
        .platform
        .as_deref()
        .ok_or(ConfigError::MissingPlatform { index })?
        .parse::<Platform>()?;
    let build = match spec.build.as_deref() {
        Some(build) => build.parse::<Build>()?,
        None => Build::default(),
    };
    let version = match spec.version.as_deref() {
        Some(token) => Version::parse(token, &format!("binary specification #{index}"))?,
        None => Version::Latest,
    };
    Ok(BinaryRef {
        platform,
        build,
        version,
    })
}

/// Produces every task of a document: binaries first, then extensions.
///
/// Validation is all-or-nothing; the first error aborts the whole plan.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found in either section.
pub fn walk_document(document: &ConfigDocument) -> Result<Vec<DownloadTask>, ConfigError> {
    let mut tasks = walk_binaries(&document.binaries)?;
    for task in walk_extensions(&document.extensions) {
        tasks.push(task?);
    }
    debug!(tasks = tasks.len(), "planned download tasks");
    Ok(tasks)
}
