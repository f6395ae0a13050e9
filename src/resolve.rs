use crate::{
    options::ScaffoldOpts,
    structure::{self, Content, FileOp, Leaf, Node, Structure, StructureError, WritePolicy},
    templates::{TemplateError, Templates},
};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),
}

/// Effective content of a leaf together with how it is meant to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// `None` when there was no leaf or the leaf carries no content of its own.
    pub content: Option<String>,
    pub policy: WritePolicy,
    pub op: FileOp,
}
impl Resolved {
    /// Marker for "this file is about to be created, nothing existed before".
    pub fn absent() -> Self {
        Self {
            content: None,
            policy: WritePolicy::Overwrite,
            op: FileOp::Overwrite,
        }
    }

    /// Packs the (possibly patched) content back into a text leaf keeping the write rules.
    pub fn into_leaf(self, content: String) -> Leaf {
        Leaf {
            content: Content::Text(content),
            policy: self.policy,
            op: self.op,
        }
    }
}

/// Materializes the content of an optional leaf.
///
/// Templates are rendered here, against the options given now, not when the leaf
/// was put into the structure.
pub fn reify_leaf(
    leaf: Option<&Leaf>,
    opts: &ScaffoldOpts,
    templates: &Templates,
) -> Result<Resolved, TemplateError> {
    let Some(leaf) = leaf else {
        return Ok(Resolved::absent());
    };

    let content = match &leaf.content {
        Content::Text(text) => Some(text.clone()),
        Content::Template(source) => Some(templates.render(source, opts)?),
        Content::None => None,
    };

    Ok(Resolved {
        content,
        policy: leaf.policy,
        op: leaf.op.clone(),
    })
}

/// Resolves `path` if present; a missing entry resolves to [`Resolved::absent`].
pub fn resolve(
    structure: &Structure,
    path: &str,
    opts: &ScaffoldOpts,
    templates: &Templates,
) -> Result<Resolved, ResolveError> {
    let leaf = match structure::get(structure, path) {
        Some(Node::File(leaf)) => Some(leaf),
        Some(Node::Dir(_)) => {
            return Err(StructureError::NotAFile {
                path: path.to_string(),
            }
            .into())
        }
        None => None,
    };

    Ok(reify_leaf(leaf, opts, templates)?)
}

/// Resolves a file that has to exist and has to have textual content.
pub fn resolve_file(
    structure: &Structure,
    path: &str,
    opts: &ScaffoldOpts,
    templates: &Templates,
) -> Result<(String, Resolved), ResolveError> {
    let leaf = structure::get_leaf(structure, path)?;
    let resolved = reify_leaf(Some(leaf), opts, templates)?;

    match resolved.content.clone() {
        Some(content) => Ok((content, resolved)),
        None => Err(StructureError::ContentlessLeaf {
            path: path.to_string(),
        }
        .into()),
    }
}
