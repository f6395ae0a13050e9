use crate::errors::{FileOperation, IoError, IoResultExt};
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("I/O error within config domain")]
    #[diagnostic(code(kopye_markdown::config::io))]
    Io(#[from] IoError),

    #[error("Unable to parse toml file at '{path}': {source}")]
    #[diagnostic(code(kopye_markdown::config::parse_toml), help("Review toml file"))]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("'{path}' is both removed and created by the conversion")]
    #[diagnostic(
        code(kopye_markdown::config::overlap),
        help("A path may appear in `obsolete` or in `documents`/`links`, not both")
    )]
    Overlap { path: String },

    #[error("'{path}' is declared more than once")]
    #[diagnostic(code(kopye_markdown::config::duplicate))]
    Duplicate { path: String },
}

/// A converted document rendered from a named template.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    pub template: String,
}

/// A file that is a symbolic link to another, project relative, file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub path: String,
    pub target: String,
}

/// Everything the conversion removes, adds and patches.
///
/// Constructed per invocation, [`Default`] is the reStructuredText to Markdown swap.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConversionConfig {
    pub obsolete: Vec<String>,
    pub documents: Vec<Document>,
    pub links: Vec<Link>,
    pub metadata_file: String,
    pub docs_config: String,
    pub tox_file: String,
    pub requirements_file: String,
    pub doc_requirements: Vec<String>,
    pub long_description: String,
    pub content_type: String,
    pub suffixes: Vec<String>,
    pub sphinx_extension: String,
}
impl Default for ConversionConfig {
    fn default() -> Self {
        let document = |path: &str, template: &str| Document {
            path: path.to_string(),
            template: template.to_string(),
        };
        let link = |path: &str, target: &str| Link {
            path: path.to_string(),
            target: target.to_string(),
        };

        Self {
            obsolete: [
                "README.rst",
                "AUTHORS.rst",
                "CHANGELOG.rst",
                "docs/index.rst",
                "docs/readme.rst",
                "docs/authors.rst",
                "docs/changelog.rst",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            documents: vec![
                document("README.md", "readme"),
                document("AUTHORS.md", "authors"),
                document("CHANGELOG.md", "changelog"),
                document("docs/index.md", "index"),
            ],
            links: vec![
                link("docs/readme.md", "README.md"),
                link("docs/authors.md", "AUTHORS.md"),
                link("docs/changelog.md", "CHANGELOG.md"),
            ],
            metadata_file: "setup.cfg".to_string(),
            docs_config: "docs/conf.py".to_string(),
            tox_file: "tox.ini".to_string(),
            requirements_file: "docs/requirements.txt".to_string(),
            doc_requirements: vec!["recommonmark".to_string()],
            long_description: "file: README.md".to_string(),
            content_type: "text/markdown; charset=UTF-8; variant=GFM".to_string(),
            suffixes: vec![".rst".to_string(), ".md".to_string()],
            sphinx_extension: "recommonmark".to_string(),
        }
    }
}
impl ConversionConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).on_path(FileOperation::Read, path)?;

        let parsed: ConversionConfig =
            toml::from_str(&content).map_err(|error| ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: error,
            })?;

        parsed.validate()?;

        Ok(parsed)
    }

    /// Paths created by the conversion, documents first.
    pub fn new_paths(&self) -> impl Iterator<Item = &str> {
        self.documents
            .iter()
            .map(|d| d.path.as_str())
            .chain(self.links.iter().map(|l| l.path.as_str()))
    }

    /// Removed and created paths must be disjoint and every created path unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let obsolete: HashSet<&str> = self.obsolete.iter().map(String::as_str).collect();
        let mut created: HashSet<&str> = HashSet::new();

        for path in self.new_paths() {
            if obsolete.contains(path) {
                return Err(ConfigError::Overlap {
                    path: path.to_string(),
                });
            }
            if !created.insert(path) {
                return Err(ConfigError::Duplicate {
                    path: path.to_string(),
                });
            }
        }

        Ok(())
    }
}
