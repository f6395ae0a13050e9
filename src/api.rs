use crate::{
    config::{ConfigError, ConversionConfig},
    errors::{FileOperation, IoError, IoResultExt},
    extension::Markdown,
    materialize::{materialize, MaterializeError, Report},
    options::ScaffoldOpts,
    patchers,
    pipeline::{Pipeline, PipelineError},
    preview::preview_as_tree,
    prompt::{self, PromptError},
    structure::Structure,
    templates::{TemplateError, Templates},
};
use std::{fs, path::Path};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Prompt(#[from] PromptError),

    #[error("I/O error")]
    #[diagnostic(code(kopye_markdown::io))]
    Io(#[from] IoError),
}

/// Generates (or updates) the project described by `opts`.
///
/// The blueprint in `opts.blueprint` is turned into a structure, the Markdown
/// conversion is applied when a `conversion` is given, and the result is previewed and
/// written. Returns the effects of the run, or `None` when the user declined.
///
/// # Errors
///
/// Returns an [`Error`] if:
///
/// - The blueprint cannot be read or one of its templates fails to render.
/// - A file the conversion patches is missing or lacks the expected section.
/// - The destination exists and neither `update` nor `force` is set.
/// - A file or link cannot be written; everything written so far is rolled back.
pub fn new_project(
    opts: &ScaffoldOpts,
    conversion: Option<ConversionConfig>,
    assume_yes: bool,
) -> Result<Option<Vec<Report>>, Error> {
    let templates = Templates::builtin()?;
    let mut pipeline = Pipeline::host();

    if let Some(config) = conversion {
        config.validate()?;
        Markdown::new(config).activate(&mut pipeline)?;
    }

    log::debug!("pipeline order: {:?}", pipeline.order()?);

    let structure = pipeline.run(Structure::new(), opts, &templates)?;

    preview_as_tree(&structure, &opts.project_path);

    if !assume_yes && !opts.pretend && !prompt::confirm_changes()? {
        log::info!("declined, nothing written");
        return Ok(None);
    }

    let reports = materialize(&structure, opts, &templates)?;

    Ok(Some(reports))
}

/// Loads the conversion configuration from `path`, or the built-in one when no path is
/// given.
pub fn load_conversion(path: Option<&Path>) -> Result<ConversionConfig, Error> {
    match path {
        Some(path) => Ok(ConversionConfig::from_file(path)?),
        None => Ok(ConversionConfig::default()),
    }
}

/// Makes sure every package in `packages` is listed in the requirements file at `file`.
/// A missing file is created.
pub fn patch_requirements(file: &Path, packages: &[String]) -> Result<(), Error> {
    let existing = if file.exists() {
        fs::read_to_string(file).on_path(FileOperation::Read, file)?
    } else {
        String::new()
    };

    let patched = patchers::add_requirements(&existing, packages);

    if patched != existing {
        fs::write(file, patched).on_path(FileOperation::Write, file)?;
    }

    Ok(())
}
