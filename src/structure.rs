//! In-memory representation of a project before it is written to disk.
//!
//! A [`Structure`] is an ordered map from path segment to [`Node`]. Directories nest,
//! files are [`Leaf`] values pairing their content with a [`WritePolicy`] and a
//! [`FileOp`] that tells the materializer what to do with them. Insertion order is
//! preserved everywhere, so previews and logs come out in the same order on every run.
use indexmap::IndexMap;
use miette::Diagnostic;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum StructureError {
    #[error("expected entry '{path}' is missing from the project structure")]
    #[diagnostic(
        code(kopye_markdown::structure::missing_entry),
        help("The blueprint is expected to provide this file")
    )]
    MissingEntry { path: String },

    #[error("'{path}' is a directory, expected a file")]
    #[diagnostic(code(kopye_markdown::structure::not_a_file))]
    NotAFile { path: String },

    #[error("'{path}' has no content and no file operation producing it")]
    #[diagnostic(
        code(kopye_markdown::structure::contentless_leaf),
        help("Leaves without content must carry a symlink operation")
    )]
    ContentlessLeaf { path: String },
}

/// Where a template is looked up when a [`Content::Template`] leaf is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Name of a template in the [`crate::templates::Templates`] registry.
    Named(String),
    /// Raw template text, e.g. a `.tera` file taken from a blueprint.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    /// Rendered against the current options only when the leaf is resolved.
    Template(TemplateSource),
    /// Nothing to write, the [`FileOp`] produces the file.
    None,
}

/// Whether an existing file on disk may be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    #[default]
    Overwrite,
    /// Leave the destination alone if something already lives there.
    NoOverwrite,
}

/// The effect a leaf has when it is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileOp {
    /// Already taken care of, nothing to do.
    NoOp,
    /// Write the resolved content to the path.
    #[default]
    Overwrite,
    /// Create a relative symbolic link pointing at this project-relative path.
    SymlinkTo(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub content: Content,
    pub policy: WritePolicy,
    pub op: FileOp,
}
impl Leaf {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Content::Text(content.into()),
            policy: WritePolicy::Overwrite,
            op: FileOp::Overwrite,
        }
    }

    pub fn template(name: impl Into<String>) -> Self {
        Self {
            content: Content::Template(TemplateSource::Named(name.into())),
            policy: WritePolicy::Overwrite,
            op: FileOp::Overwrite,
        }
    }

    pub fn symlink(target: impl Into<PathBuf>) -> Self {
        Self {
            content: Content::None,
            policy: WritePolicy::Overwrite,
            op: FileOp::SymlinkTo(target.into()),
        }
    }

    pub fn no_overwrite(mut self) -> Self {
        self.policy = WritePolicy::NoOverwrite;
        self
    }

    /// A leaf is meaningful if it either carries content or an operation producing it.
    pub fn validate(&self, path: &str) -> Result<(), StructureError> {
        match (&self.content, &self.op) {
            (Content::None, FileOp::Overwrite) => Err(StructureError::ContentlessLeaf {
                path: path.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Dir(Structure),
    File(Leaf),
}

pub type Structure = IndexMap<String, Node>;

/// Splits a `/` separated path into its segments, dropping `.` and resolving `..`.
pub fn segments(path: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();

    for component in Path::new(path).components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(segment) => parts.push(segment.to_string_lossy().into_owned()),
        }
    }

    parts
}

pub fn get<'a>(structure: &'a Structure, path: &str) -> Option<&'a Node> {
    let parts = segments(path);
    let (last, parents) = parts.split_last()?;

    let mut current = structure;
    for part in parents {
        match current.get(part)? {
            Node::Dir(children) => current = children,
            Node::File(_) => return None,
        }
    }

    current.get(last)
}

/// Looks up a file, failing when it is absent or a directory.
pub fn get_leaf<'a>(structure: &'a Structure, path: &str) -> Result<&'a Leaf, StructureError> {
    match get(structure, path) {
        Some(Node::File(leaf)) => Ok(leaf),
        Some(Node::Dir(_)) => Err(StructureError::NotAFile {
            path: path.to_string(),
        }),
        None => Err(StructureError::MissingEntry {
            path: path.to_string(),
        }),
    }
}

/// Inserts `node` at `path`, creating intermediate directories as needed.
///
/// An existing entry at `path` keeps its position and gets replaced; a file sitting
/// where a directory is needed is replaced by that directory.
pub fn insert(structure: &mut Structure, path: &str, node: Node) {
    let parts = segments(path);
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut current = structure;
    for part in parents {
        let entry = current
            .entry(part.clone())
            .or_insert_with(|| Node::Dir(Structure::new()));

        if matches!(*entry, Node::File(_)) {
            *entry = Node::Dir(Structure::new());
        }

        current = match entry {
            Node::Dir(children) => children,
            Node::File(_) => unreachable!("replaced by a directory above"),
        };
    }

    current.insert(last.clone(), node);
}

/// Removes `path` from the structure. Absent paths are ignored.
pub fn reject(structure: &mut Structure, path: &str) -> Option<Node> {
    let parts = segments(path);
    let (last, parents) = parts.split_last()?;

    let mut current = structure;
    for part in parents {
        match current.get_mut(part)? {
            Node::Dir(children) => current = children,
            Node::File(_) => return None,
        }
    }

    current.shift_remove(last)
}

/// Deep merge of `other` into `base`.
///
/// Directories merge recursively; for files, `other` wins. Entries already in `base`
/// keep their position, new ones are appended in `other`'s order.
pub fn merge(mut base: Structure, other: Structure) -> Structure {
    for (name, node) in other {
        match base.get_mut(&name) {
            Some(existing) => match (existing, node) {
                (Node::Dir(children), Node::Dir(incoming)) => {
                    let merged = merge(std::mem::take(children), incoming);
                    *children = merged;
                }
                (slot, node) => *slot = node,
            },
            None => {
                base.insert(name, node);
            }
        }
    }

    base
}

/// All files of the structure with their `/` separated paths, in traversal order.
pub fn files(structure: &Structure) -> Vec<(String, &Leaf)> {
    fn walk<'a>(structure: &'a Structure, prefix: &str, out: &mut Vec<(String, &'a Leaf)>) {
        for (name, node) in structure {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };

            match node {
                Node::Dir(children) => walk(children, &path, out),
                Node::File(leaf) => out.push((path, leaf)),
            }
        }
    }

    let mut out = Vec::new();
    walk(structure, "", &mut out);
    out
}

/// All directories of the structure, parents before children.
pub fn dirs(structure: &Structure) -> Vec<String> {
    fn walk(structure: &Structure, prefix: &str, out: &mut Vec<String>) {
        for (name, node) in structure {
            if let Node::Dir(children) = node {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                out.push(path.clone());
                walk(children, &path, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(structure, "", &mut out);
    out
}
