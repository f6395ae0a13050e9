use indexmap::IndexMap;
use std::path::PathBuf;
use tera::Context;

/// Scaffolding parameters for one run.
///
/// Built once by the caller and handed by reference through every action; nothing
/// in the pipeline mutates it.
#[derive(Debug, Clone, Default)]
pub struct ScaffoldOpts {
    /// Destination root of the generated project.
    pub project_path: PathBuf,
    /// Human facing project name, defaults to the destination directory name.
    pub name: String,
    /// Package name, defaults to `name` with `-` replaced by `_`.
    pub package: String,
    /// Directory holding the blueprint the project is generated from.
    pub blueprint: Option<PathBuf>,
    /// Re-running on a project that already exists.
    pub update: bool,
    /// Allow overwriting and other destructive operations.
    pub force: bool,
    /// Compute everything but do not touch the filesystem.
    pub pretend: bool,
    /// Report every side effect.
    pub log: bool,
    /// Additional template variables.
    pub extra: IndexMap<String, String>,
}
impl ScaffoldOpts {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        let project_path = project_path.into();
        let name = project_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let package = name.replace('-', "_");

        Self {
            project_path,
            name,
            package,
            ..Self::default()
        }
    }

    /// Pretending is pointless without seeing what would happen, so it implies logging.
    pub fn should_log(&self) -> bool {
        self.log || self.pretend
    }

    /// Only a first run (or an explicitly forced update) may rewrite generated files.
    pub fn is_first_run(&self) -> bool {
        !self.update || self.force
    }

    /// Template variables derived from these options.
    pub fn tera_context(&self) -> Context {
        let mut context = Context::new();

        context.insert("name", &self.name);
        context.insert("project", &self.name);
        context.insert("package", &self.package);
        context.insert("project_path", &self.project_path.display().to_string());
        context.insert("title", &title_rule(&self.name));

        for (key, value) in &self.extra {
            context.insert(key.as_str(), value);
        }

        context
    }
}

/// Underline of `=` as wide as the text, used by heading templates.
fn title_rule(text: &str) -> String {
    "=".repeat(text.chars().count())
}
