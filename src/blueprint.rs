use crate::{
    errors::{FileOperation, IoError, IoResultExt},
    options::ScaffoldOpts,
    structure::{self, Content, FileOp, Leaf, Node, Structure, TemplateSource, WritePolicy},
};
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error, Diagnostic)]
pub enum BlueprintError {
    #[error("I/O error within blueprint domain")]
    #[diagnostic(code(kopye_markdown::blueprint::io))]
    Io(#[from] IoError),

    #[error("blueprint directory not found: {path}")]
    #[diagnostic(
        code(kopye_markdown::blueprint::not_found),
        help("Point to a directory containing the files of the project to generate")
    )]
    NotFound { path: PathBuf },

    #[error("Error occurred attempting to render path segment '{segment}'")]
    #[diagnostic(code(kopye_markdown::blueprint::render_path))]
    RenderPath {
        segment: String,
        #[source]
        source: tera::Error,
    },

    #[error("unable to strip prefix from directory")]
    #[diagnostic(code(kopye_markdown::blueprint::strip_prefix))]
    StripPrefix {
        path: PathBuf,
        dir: PathBuf,
        source: std::path::StripPrefixError,
    },
}

const TERA_FILE_EXTENSION: &str = "tera";

/// Files living in a blueprint that are not part of the generated project.
const IGNORED: [&str; 2] = ["blueprint.toml", "kopye.questions.toml"];

/// Renders every component of `path` and joins them with `/`.
///
/// Returns `None` if any component renders to nothing, which is how a blueprint
/// conditionally leaves out a file or a whole directory:
/// `{% if docs %}docs{% endif %}/conf.py` disappears when `docs` is false.
fn render_path_segments(path: &Path, ctx: &Context) -> Result<Option<String>, BlueprintError> {
    let mut rendered_segments: Vec<String> = Vec::new();

    for component in path.components() {
        let segment = component.as_os_str().to_string_lossy();

        let rendered =
            Tera::one_off(&segment, ctx, false).map_err(|error| BlueprintError::RenderPath {
                segment: segment.to_string(),
                source: error,
            })?;

        if rendered.trim().is_empty() {
            return Ok(None);
        }

        rendered_segments.push(rendered.trim().to_string());
    }

    Ok(Some(rendered_segments.join("/")))
}

/// Walks `blueprint` and turns it into a [`Structure`].
///
/// Path segments are rendered right away; the content of `.tera` files is kept as a
/// template and rendered only when the leaf is resolved. On updates every file is
/// marked [`WritePolicy::NoOverwrite`] so existing files are left alone.
pub fn build_structure(blueprint: &Path, opts: &ScaffoldOpts) -> Result<Structure, BlueprintError> {
    if !blueprint.is_dir() {
        return Err(BlueprintError::NotFound {
            path: blueprint.to_path_buf(),
        });
    }

    let ctx = opts.tera_context();
    let policy = if opts.update {
        WritePolicy::NoOverwrite
    } else {
        WritePolicy::Overwrite
    };

    let mut tree = Structure::new();

    // sorted so the structure, and everything printed from it, is stable across runs
    for entry in WalkDir::new(blueprint).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(error) => {
                let path = error.path().unwrap_or_else(|| Path::new("")).to_path_buf();

                Err(IoError::new(FileOperation::Read, path, error.into()))?
            }
        };

        let file_name = entry.file_name().to_string_lossy();
        if IGNORED.contains(&file_name.as_ref()) {
            continue;
        }

        let full_path = entry.path();
        let relative = full_path
            .strip_prefix(blueprint)
            .map_err(|error| BlueprintError::StripPrefix {
                path: full_path.to_path_buf(),
                dir: blueprint.to_path_buf(),
                source: error,
            })?;

        let Some(rendered_path) = render_path_segments(relative, &ctx)? else {
            log::debug!("skipping {}, a path segment rendered empty", relative.display());
            continue;
        };

        if entry.file_type().is_dir() {
            if structure::get(&tree, &rendered_path).is_none() {
                structure::insert(&mut tree, &rendered_path, Node::Dir(Structure::new()));
            }
            continue;
        }

        let raw = std::fs::read_to_string(full_path).on_path(FileOperation::Read, full_path)?;

        let (rendered_path, content) =
            match rendered_path.strip_suffix(&format!(".{TERA_FILE_EXTENSION}")) {
                Some(stripped) => (
                    stripped.to_string(),
                    Content::Template(TemplateSource::Raw(raw)),
                ),
                None => (rendered_path.clone(), Content::Text(raw)),
            };

        log::debug!("blueprint entry: {}", rendered_path);

        structure::insert(
            &mut tree,
            &rendered_path,
            Node::File(Leaf {
                content,
                policy,
                op: FileOp::Overwrite,
            }),
        );
    }

    Ok(tree)
}
