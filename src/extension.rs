//! The reStructuredText to Markdown conversion.
//!
//! Two actions are contributed to the scaffolding [`Pipeline`]:
//!
//! - `add_doc_requirements` makes sure the docs can be built with the Markdown
//!   parser (docs requirements file, `tox.ini`);
//! - `replace_files` drops the `.rst` documents, patches the package metadata and the
//!   Sphinx configuration and adds the Markdown documents and links.
//!
//! On updates, unless forced, only the obsolete `.rst` entries are dropped; nothing
//! is patched or added, so hand edited files of an existing project are never clobbered.
use crate::{
    config::{ConfigError, ConversionConfig},
    options::ScaffoldOpts,
    patchers::{self, PatchError},
    pipeline::{Action, ActionError, Pipeline, PipelineError, Position},
    resolve::{resolve, resolve_file, ResolveError},
    structure::{self, Leaf, Node, Structure},
    templates::{TemplateError, Templates, AUTO_STRUCTIFY},
};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ExtensionError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("unable to patch '{path}'")]
    #[diagnostic(code(kopye_markdown::extension::patch))]
    Patch {
        path: String,
        #[source]
        #[diagnostic_source]
        source: PatchError,
    },
}

fn patch_error(path: &str) -> impl FnOnce(PatchError) -> ExtensionError + '_ {
    move |source| ExtensionError::Patch {
        path: path.to_string(),
        source,
    }
}

/// Requirements needed to build the docs, plus activating them in `tox.ini`.
pub fn add_doc_requirements(
    structure: Structure,
    opts: &ScaffoldOpts,
    templates: &Templates,
    config: &ConversionConfig,
) -> Result<Structure, ExtensionError> {
    if !opts.is_first_run() {
        log::debug!("update without force, leaving doc requirements alone");
        return Ok(structure);
    }

    let mut files = Structure::new();

    let requirements = resolve(&structure, &config.requirements_file, opts, templates)?;
    let leaf = match requirements.content.clone() {
        Some(existing) => {
            let merged = patchers::add_requirements(&existing, &config.doc_requirements);
            requirements.into_leaf(merged)
        }
        None => Leaf::text(patchers::add_requirements("", &config.doc_requirements)).no_overwrite(),
    };
    structure::insert(&mut files, &config.requirements_file, Node::File(leaf));

    let tox = resolve(&structure, &config.tox_file, opts, templates)?;
    if let Some(content) = tox.content.clone() {
        let patched = patchers::link_tox_requirements(&content, &config.requirements_file)
            .map_err(patch_error(&config.tox_file))?;
        structure::insert(&mut files, &config.tox_file, Node::File(tox.into_leaf(patched)));
    }

    Ok(structure::merge(structure, files))
}

/// Swaps the reStructuredText documents for Markdown ones.
///
/// Every obsolete path is gone afterwards, every document and link of `config` is
/// present exactly once. Untouched entries keep their position.
pub fn replace_files(
    mut structure: Structure,
    opts: &ScaffoldOpts,
    templates: &Templates,
    config: &ConversionConfig,
) -> Result<Structure, ExtensionError> {
    config.validate()?;

    // dropping entries writes nothing, so it also happens on updates
    for path in &config.obsolete {
        if structure::reject(&mut structure, path).is_some() {
            log::debug!("removed {}", path);
        }
    }

    if !opts.is_first_run() {
        log::debug!("update without force, keeping existing documents");
        return Ok(structure);
    }

    let (content, resolved) = resolve_file(&structure, &config.metadata_file, opts, templates)?;
    let patched = patchers::add_long_desc(&content, &config.long_description, &config.content_type)
        .map_err(patch_error(&config.metadata_file))?;
    structure::insert(
        &mut structure,
        &config.metadata_file,
        Node::File(resolved.into_leaf(patched)),
    );

    let (content, resolved) = resolve_file(&structure, &config.docs_config, opts, templates)?;
    let patched = patchers::add_sphinx_md(
        &content,
        &config.suffixes,
        &config.sphinx_extension,
        AUTO_STRUCTIFY,
    )
    .map_err(patch_error(&config.docs_config))?;
    structure::insert(
        &mut structure,
        &config.docs_config,
        Node::File(resolved.into_leaf(patched)),
    );

    let mut files = Structure::new();

    for document in &config.documents {
        if !templates.contains(&document.template) {
            return Err(TemplateError::NotFound {
                name: document.template.clone(),
            }
            .into());
        }

        let leaf = Leaf::template(document.template.as_str()).no_overwrite();
        structure::insert(&mut files, &document.path, Node::File(leaf));
    }

    for link in &config.links {
        let leaf = Leaf::symlink(link.target.as_str()).no_overwrite();
        structure::insert(&mut files, &link.path, Node::File(leaf));
    }

    Ok(structure::merge(structure, files))
}

/// Runs both conversion steps in pipeline order.
pub fn transform(
    structure: Structure,
    opts: &ScaffoldOpts,
    templates: &Templates,
    config: &ConversionConfig,
) -> Result<Structure, ExtensionError> {
    let structure = add_doc_requirements(structure, opts, templates, config)?;
    replace_files(structure, opts, templates, config)
}

struct AddDocRequirements(ConversionConfig);
impl Action for AddDocRequirements {
    fn name(&self) -> &'static str {
        "add_doc_requirements"
    }

    fn run(
        &self,
        structure: Structure,
        opts: &ScaffoldOpts,
        templates: &Templates,
    ) -> Result<Structure, ActionError> {
        Ok(add_doc_requirements(structure, opts, templates, &self.0)?)
    }
}

struct ReplaceFiles(ConversionConfig);
impl Action for ReplaceFiles {
    fn name(&self) -> &'static str {
        "replace_files"
    }

    fn run(
        &self,
        structure: Structure,
        opts: &ScaffoldOpts,
        templates: &Templates,
    ) -> Result<Structure, ActionError> {
        Ok(replace_files(structure, opts, templates, &self.0)?)
    }
}

/// Replace reStructuredText by Markdown.
#[derive(Debug, Clone, Default)]
pub struct Markdown {
    config: ConversionConfig,
}
impl Markdown {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    /// Wires the conversion into `pipeline`; the documents are swapped before the
    /// project directory is verified.
    pub fn activate(&self, pipeline: &mut Pipeline) -> Result<(), PipelineError> {
        pipeline.register(
            Box::new(AddDocRequirements(self.config.clone())),
            &[Position::After("define_structure")],
        )?;
        pipeline.register(
            Box::new(ReplaceFiles(self.config.clone())),
            &[
                Position::After("define_structure"),
                Position::Before("verify_project_dir"),
            ],
        )
    }
}
