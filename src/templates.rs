use crate::{options::ScaffoldOpts, structure::TemplateSource};
use miette::Diagnostic;
use tera::Tera;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    #[error("no template registered under the name '{name}'")]
    #[diagnostic(
        code(kopye_markdown::template::not_found),
        help("Available templates: readme, authors, changelog, index")
    )]
    NotFound { name: String },

    #[error("unable to register built-in template '{name}'")]
    #[diagnostic(code(kopye_markdown::template::registration))]
    Registration {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("Error occurred attempting to render template '{name}'")]
    #[diagnostic(code(kopye_markdown::template::render))]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },
}

const BUILTIN: [(&str, &str); 4] = [
    ("readme", include_str!("../templates/readme.md.tera")),
    ("authors", include_str!("../templates/authors.md.tera")),
    ("changelog", include_str!("../templates/changelog.md.tera")),
    ("index", include_str!("../templates/index.md.tera")),
];

/// Configuration block appended to the Sphinx `conf.py`. Inserted verbatim.
pub const AUTO_STRUCTIFY: &str = include_str!("../templates/auto_structify.py");

/// Registry of the named templates the Markdown conversion ships with.
#[derive(Debug, Clone)]
pub struct Templates {
    tera: Tera,
}
impl Templates {
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();

        for (name, source) in BUILTIN {
            tera.add_raw_template(name, source)
                .map_err(|error| TemplateError::Registration {
                    name: name.to_string(),
                    source: error,
                })?;
        }

        // generated files are plain text, never html-escape substitutions
        tera.autoescape_on(vec![]);

        Ok(Self { tera })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|registered| registered == name)
    }

    pub fn render(
        &self,
        source: &TemplateSource,
        opts: &ScaffoldOpts,
    ) -> Result<String, TemplateError> {
        let context = opts.tera_context();

        match source {
            TemplateSource::Named(name) => {
                if !self.contains(name) {
                    return Err(TemplateError::NotFound { name: name.clone() });
                }

                log::debug!("rendering template: {}", name);

                self.tera
                    .render(name, &context)
                    .map_err(|error| TemplateError::Render {
                        name: name.clone(),
                        source: error,
                    })
            }
            TemplateSource::Raw(raw) => {
                Tera::one_off(raw, &context, false).map_err(|error| TemplateError::Render {
                    name: "<inline>".to_string(),
                    source: error,
                })
            }
        }
    }
}
