use crate::{
    blueprint::{build_structure, BlueprintError},
    extension::ExtensionError,
    options::ScaffoldOpts,
    structure::Structure,
    templates::Templates,
};
use indexmap::IndexMap;
use miette::Diagnostic;
use std::path::PathBuf;
use tampopo::{errors::SortError, sort_graph, Graph};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ActionError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Blueprint(#[from] BlueprintError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extension(#[from] ExtensionError),

    #[error("destination '{path}' already exists")]
    #[diagnostic(
        code(kopye_markdown::pipeline::directory_exists),
        help("Use --update to update an existing project or --force to overwrite it")
    )]
    DirectoryExists { path: PathBuf },
}

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("no action named '{name}' to register against")]
    #[diagnostic(code(kopye_markdown::pipeline::unknown_action))]
    UnknownAction { name: String },

    #[error("action '{name}' is already registered")]
    #[diagnostic(code(kopye_markdown::pipeline::duplicate_action))]
    DuplicateAction { name: String },

    #[error("actions depend on each other in a cycle: {}", .actions.join(", "))]
    #[diagnostic(code(kopye_markdown::pipeline::cycle))]
    Cycle { actions: Vec<String> },

    #[error("action '{name}' failed")]
    #[diagnostic(code(kopye_markdown::pipeline::action))]
    Action {
        name: String,
        #[source]
        #[diagnostic_source]
        source: ActionError,
    },
}

/// One step of the scaffolding pipeline, turning a structure into the next one.
pub trait Action {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        structure: Structure,
        opts: &ScaffoldOpts,
        templates: &Templates,
    ) -> Result<Structure, ActionError>;
}

/// Where a newly registered action goes relative to an already registered one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before(&'static str),
    After(&'static str),
}

/// Builds the structure from the blueprint named in the options. Without a blueprint
/// the incoming structure is passed on untouched.
struct DefineStructure;
impl Action for DefineStructure {
    fn name(&self) -> &'static str {
        "define_structure"
    }

    fn run(
        &self,
        structure: Structure,
        opts: &ScaffoldOpts,
        _templates: &Templates,
    ) -> Result<Structure, ActionError> {
        match &opts.blueprint {
            Some(blueprint) => Ok(crate::structure::merge(
                structure,
                build_structure(blueprint, opts)?,
            )),
            None => Ok(structure),
        }
    }
}

/// Refuses to generate into an existing directory unless updating or forced.
struct VerifyProjectDir;
impl Action for VerifyProjectDir {
    fn name(&self) -> &'static str {
        "verify_project_dir"
    }

    fn run(
        &self,
        structure: Structure,
        opts: &ScaffoldOpts,
        _templates: &Templates,
    ) -> Result<Structure, ActionError> {
        if opts.project_path.exists() && !opts.update && !opts.force {
            return Err(ActionError::DirectoryExists {
                path: opts.project_path.clone(),
            });
        }

        Ok(structure)
    }
}

/// Ordered collection of actions.
///
/// Actions are kept by name; the execution order is the registration order,
/// adjusted so every `Before`/`After` constraint holds.
pub struct Pipeline {
    actions: IndexMap<&'static str, Box<dyn Action>>,
    edges: Vec<(&'static str, &'static str)>,
}
impl Default for Pipeline {
    fn default() -> Self {
        Self::host()
    }
}
impl Pipeline {
    pub fn empty() -> Self {
        Self {
            actions: IndexMap::new(),
            edges: Vec::new(),
        }
    }

    /// The actions every project generation runs.
    pub fn host() -> Self {
        let mut pipeline = Self::empty();
        pipeline.actions.insert("define_structure", Box::new(DefineStructure));
        pipeline
            .actions
            .insert("verify_project_dir", Box::new(VerifyProjectDir));
        pipeline.edges.push(("define_structure", "verify_project_dir"));
        pipeline
    }

    pub fn register(
        &mut self,
        action: Box<dyn Action>,
        positions: &[Position],
    ) -> Result<(), PipelineError> {
        let name = action.name();

        if self.actions.contains_key(name) {
            return Err(PipelineError::DuplicateAction {
                name: name.to_string(),
            });
        }

        for position in positions {
            let (Position::Before(anchor) | Position::After(anchor)) = position;
            if !self.actions.contains_key(anchor) {
                return Err(PipelineError::UnknownAction {
                    name: anchor.to_string(),
                });
            }
        }

        for position in positions {
            match *position {
                Position::Before(anchor) => self.edges.push((name, anchor)),
                Position::After(anchor) => self.edges.push((anchor, name)),
            }
        }

        log::debug!("registered action: {}", name);
        self.actions.insert(name, action);

        Ok(())
    }

    pub fn order(&self) -> Result<Vec<&'static str>, PipelineError> {
        let graph = Graph {
            nodes: self.actions.keys().copied().collect(),
            edges: self.edges.clone(),
        };

        sort_graph(&graph).map_err(|error| match error {
            SortError::CycleDetected(nodes) => PipelineError::Cycle {
                actions: nodes.into_iter().map(String::from).collect(),
            },
            SortError::UnknownNode(node) => PipelineError::UnknownAction {
                name: node.to_string(),
            },
        })
    }

    pub fn run(
        &self,
        mut structure: Structure,
        opts: &ScaffoldOpts,
        templates: &Templates,
    ) -> Result<Structure, PipelineError> {
        for name in self.order()? {
            let Some(action) = self.actions.get(name) else {
                continue;
            };

            log::debug!("running action: {}", name);

            structure = action
                .run(structure, opts, templates)
                .map_err(|error| PipelineError::Action {
                    name: name.to_string(),
                    source: error,
                })?;
        }

        Ok(structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ConversionConfig,
        extension::Markdown,
        structure::{self, Leaf, Node},
    };

    struct Touch(&'static str);
    impl Action for Touch {
        fn name(&self) -> &'static str {
            self.0
        }

        fn run(
            &self,
            mut structure: Structure,
            _opts: &ScaffoldOpts,
            _templates: &Templates,
        ) -> Result<Structure, ActionError> {
            let count = structure.len();
            structure::insert(
                &mut structure,
                &format!("{count}-{}", self.0),
                Node::File(Leaf::text("")),
            );
            Ok(structure)
        }
    }

    #[test]
    fn markdown_runs_between_definition_and_verification() {
        let mut pipeline = Pipeline::host();
        Markdown::new(ConversionConfig::default())
            .activate(&mut pipeline)
            .unwrap();

        assert_eq!(
            pipeline.order().unwrap(),
            vec![
                "define_structure",
                "add_doc_requirements",
                "replace_files",
                "verify_project_dir",
            ]
        );
    }

    #[test]
    fn constraints_win_over_registration_order() {
        let mut pipeline = Pipeline::empty();
        pipeline.register(Box::new(Touch("a")), &[]).unwrap();
        pipeline.register(Box::new(Touch("b")), &[]).unwrap();
        pipeline
            .register(Box::new(Touch("c")), &[Position::Before("a")])
            .unwrap();

        let structure = pipeline
            .run(
                Structure::new(),
                &ScaffoldOpts::new("proj"),
                &Templates::builtin().unwrap(),
            )
            .unwrap();

        let keys: Vec<&String> = structure.keys().collect();
        assert_eq!(keys, vec!["0-b", "1-c", "2-a"]);
    }

    #[test]
    fn registering_against_unknown_action_fails() {
        let mut pipeline = Pipeline::empty();
        let result = pipeline.register(Box::new(Touch("a")), &[Position::After("ghost")]);

        assert!(matches!(result, Err(PipelineError::UnknownAction { name }) if name == "ghost"));
    }

    #[test]
    fn registering_twice_fails() {
        let mut pipeline = Pipeline::host();
        let result = pipeline.register(Box::new(Touch("verify_project_dir")), &[]);

        assert!(matches!(result, Err(PipelineError::DuplicateAction { .. })));
    }

    #[test]
    fn contradicting_constraints_are_a_cycle() {
        let mut pipeline = Pipeline::host();
        pipeline
            .register(
                Box::new(Touch("x")),
                &[
                    Position::Before("define_structure"),
                    Position::After("verify_project_dir"),
                ],
            )
            .unwrap();

        assert!(matches!(pipeline.order(), Err(PipelineError::Cycle { .. })));
    }

    #[test]
    fn existing_destination_is_refused_unless_updating() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::host();
        let templates = Templates::builtin().unwrap();

        let result = pipeline.run(Structure::new(), &ScaffoldOpts::new(dir.path()), &templates);
        assert!(matches!(
            result,
            Err(PipelineError::Action {
                source: ActionError::DirectoryExists { .. },
                ..
            })
        ));

        let update = ScaffoldOpts {
            update: true,
            ..ScaffoldOpts::new(dir.path())
        };
        assert!(pipeline.run(Structure::new(), &update, &templates).is_ok());
    }
}
