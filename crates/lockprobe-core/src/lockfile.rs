use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::ParseError;
use crate::ini::{IniDocument, IniEntry};

/// Id of the synthetic consumer node the package manager puts at the root.
pub const ROOT_NODE_ID: &str = "0";
/// Id of the first real package in a single-reference lock.
pub const FIRST_NODE_ID: &str = "1";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockNode {
    pub reference: Option<String>,
    pub revision: Option<String>,
    pub package_id: Option<String>,
    pub package_revision: Option<String>,
    pub path: Option<String>,
    pub context: Option<String>,
    pub raw_options: Vec<String>,
    pub options: BTreeMap<String, String>,
    pub requires: Vec<String>,
    pub build_requires: Vec<String>,
}

impl LockNode {
    pub fn name(&self) -> Option<&str> {
        self.split_reference().map(|(name, _)| name)
    }

    pub fn version(&self) -> Option<&str> {
        self.split_reference().map(|(_, version)| version)
    }

    fn split_reference(&self) -> Option<(&str, &str)> {
        self.reference.as_deref()?.split_once('/')
    }

    fn from_raw(raw: RawLockNode) -> Result<Self, ParseError> {
        let (reference, revision) = match raw.reference.filter(|value| !value.is_empty()) {
            Some(full) => {
                let (reference, revision) = full
                    .split_once('#')
                    .ok_or_else(|| ParseError::MissingRevisionSeparator {
                        reference: full.clone(),
                    })?;
                (Some(reference.to_string()), Some(revision.to_string()))
            }
            None => (None, None),
        };

        let raw_options: Vec<String> = raw
            .options
            .as_deref()
            .map(|blob| blob.split('\n').map(str::to_string).collect())
            .unwrap_or_default();
        let options = parse_option_lines(&raw_options)?;

        Ok(Self {
            reference,
            revision,
            package_id: raw.package_id,
            package_revision: raw.prev,
            path: raw.path,
            context: raw.context,
            raw_options,
            options,
            requires: raw.requires,
            build_requires: raw.build_requires,
        })
    }
}

/// Splits each non-blank `key=value` line on its first `=`.
pub fn parse_option_lines<S: AsRef<str>>(
    lines: &[S],
) -> Result<BTreeMap<String, String>, ParseError> {
    let mut options = BTreeMap::new();
    for line in lines {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ParseError::MalformedOption {
                line: line.to_string(),
            })?;
        options.insert(key.to_string(), value.to_string());
    }
    Ok(options)
}

/// The `profile_host` block embedded in a lock document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSection {
    document: IniDocument,
}

impl ProfileSection {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        Ok(Self {
            document: IniDocument::parse(raw)?,
        })
    }

    pub fn section(&self, name: &str) -> &[IniEntry] {
        self.document.entries(name)
    }

    /// Entries of `section` whose key is one of `keys`, in document order.
    pub fn get(&self, section: &str, keys: &[&str]) -> Vec<IniEntry> {
        self.section(section)
            .iter()
            .filter(|(key, _)| keys.contains(&key.as_str()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockDocument {
    nodes: BTreeMap<String, LockNode>,
    profile_host: ProfileSection,
    version: Option<String>,
    revisions_enabled: bool,
    recipe_path: Option<PathBuf>,
}

impl LockDocument {
    /// Parses a lock document. `location` is the path the document was read
    /// from; the root node's recipe path is resolved against its directory.
    pub fn parse(content: &str, location: Option<&Path>) -> Result<Self, ParseError> {
        let raw: RawLockFile = serde_json::from_str(content)?;
        let graph_lock = raw.graph_lock.ok_or(ParseError::MissingField {
            field: "graph_lock",
        })?;
        let raw_nodes = graph_lock.nodes.ok_or(ParseError::MissingField {
            field: "graph_lock.nodes",
        })?;
        let profile_raw = raw.profile_host.ok_or(ParseError::MissingField {
            field: "profile_host",
        })?;

        let mut nodes = BTreeMap::new();
        for (id, node) in raw_nodes {
            nodes.insert(id, LockNode::from_raw(node)?);
        }

        let recipe_path = nodes
            .get(ROOT_NODE_ID)
            .and_then(|root| root.path.as_deref())
            .map(|relative| {
                let base = location
                    .and_then(Path::parent)
                    .unwrap_or_else(|| Path::new(""));
                normalize_lexically(&base.join(relative))
            });

        Ok(Self {
            nodes,
            profile_host: ProfileSection::parse(&profile_raw)?,
            version: raw.version,
            revisions_enabled: graph_lock.revisions_enabled,
            recipe_path,
        })
    }

    pub fn nodes(&self) -> &BTreeMap<String, LockNode> {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&LockNode> {
        self.nodes.get(id)
    }

    pub fn root_node(&self) -> Option<&LockNode> {
        self.node(ROOT_NODE_ID)
    }

    pub fn first_node(&self) -> Option<&LockNode> {
        self.node(FIRST_NODE_ID)
    }

    pub fn profile_host(&self) -> &ProfileSection {
        &self.profile_host
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn revisions_enabled(&self) -> bool {
        self.revisions_enabled
    }

    pub fn recipe_path(&self) -> Option<&Path> {
        self.recipe_path.as_deref()
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[derive(Debug, Deserialize)]
struct RawLockFile {
    graph_lock: Option<RawGraphLock>,
    profile_host: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGraphLock {
    nodes: Option<BTreeMap<String, RawLockNode>>,
    #[serde(default)]
    revisions_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct RawLockNode {
    #[serde(rename = "ref")]
    reference: Option<String>,
    package_id: Option<String>,
    prev: Option<String>,
    options: Option<String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    build_requires: Vec<String>,
    path: Option<String>,
    context: Option<String>,
}
