//! Writes a [`Structure`] to disk.
//!
//! This is the one place interpreting [`FileOp`] values. Directories come first,
//! then regular files, then links so every link target already exists by the time
//! it is pointed at. All effects are recorded in a [`Transaction`] that rolls back
//! when an error propagates out.
use crate::{
    errors::{FileOperation, IoError, IoResultExt},
    link::{make_link, relative_target, LinkError},
    options::ScaffoldOpts,
    resolve::reify_leaf,
    structure::{self, FileOp, Structure, StructureError, WritePolicy},
    templates::{TemplateError, Templates},
    transactions::{Active, RollbackOperation, Transaction},
};
use colored::Colorize;
use miette::Diagnostic;
use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MaterializeError {
    #[error("I/O error within materialize domain")]
    #[diagnostic(code(kopye_markdown::materialize::io))]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Link(#[from] LinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Overwrite,
    Identical,
    Skip,
    Symlink,
}
impl Action {
    fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Overwrite => "overwrite",
            Self::Identical => "identical",
            Self::Skip => "skip",
            Self::Symlink => "symlink",
        }
    }
}
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One effect of a materialization run (or of a pretended one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub action: Action,
    pub path: PathBuf,
}

/// Prints a single effect line, `create path/to/file`.
pub fn report(action: Action, path: &Path, target: Option<&Path>) {
    let label = match action {
        Action::Create => action.as_str().green(),
        Action::Overwrite => action.as_str().yellow(),
        Action::Identical | Action::Skip => action.as_str().blue(),
        Action::Symlink => action.as_str().cyan(),
    };

    match target {
        Some(target) => println!("{} {} => {}", label, path.display(), target.display()),
        None => println!("{} {}", label, path.display()),
    }
}

/// Replaces `path` atomically with `contents`.
fn write_file(path: &Path, contents: &str) -> Result<(), IoError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut staged = tempfile::NamedTempFile::new_in(parent).on_path(FileOperation::Write, path)?;
    staged
        .write_all(contents.as_bytes())
        .on_path(FileOperation::Write, path)?;
    staged
        .persist(path)
        .map_err(|error| IoError::new(FileOperation::Write, path.to_path_buf(), error.error))?;

    Ok(())
}

fn create_directory(trx: &mut Transaction<Active>, path: &Path) -> Result<(), IoError> {
    if path.is_dir() {
        return Ok(());
    }

    // only the outermost missing ancestor has to be registered for rollback
    let mut outermost = path;
    while let Some(parent) = outermost.parent() {
        if parent.as_os_str().is_empty() || parent.exists() {
            break;
        }
        outermost = parent;
    }

    fs::create_dir_all(path).on_path(FileOperation::Mkdir, path)?;
    trx.add_operation(RollbackOperation::RemoveDir(outermost.to_path_buf()));

    Ok(())
}

/// Writes `structure` below `opts.project_path`.
///
/// With `opts.pretend` nothing on disk changes, the returned reports describe what
/// would have happened.
pub fn materialize(
    structure: &Structure,
    opts: &ScaffoldOpts,
    templates: &Templates,
) -> Result<Vec<Report>, MaterializeError> {
    let root = opts.project_path.as_path();
    let mut trx = Transaction::<Active>::new();
    let mut reports: Vec<Report> = Vec::new();

    let record = |action: Action, path: &Path, reports: &mut Vec<Report>| {
        if opts.should_log() && action != Action::Symlink {
            report(action, path, None);
        }
        reports.push(Report {
            action,
            path: path.to_path_buf(),
        });
    };

    if !opts.pretend {
        create_directory(&mut trx, root)?;
        for dir in structure::dirs(structure) {
            create_directory(&mut trx, &root.join(dir))?;
        }
    }

    let files = structure::files(structure);

    for (relative, leaf) in &files {
        leaf.validate(relative)?;

        if leaf.op != FileOp::Overwrite {
            continue;
        }

        let path = root.join(relative);
        let resolved = reify_leaf(Some(*leaf), opts, templates)?;
        let contents = resolved.content.unwrap_or_default();

        let previous = if path.is_file() {
            Some(fs::read(&path).on_path(FileOperation::Read, &path)?)
        } else {
            None
        };

        let action = match &previous {
            None => Action::Create,
            Some(_) if leaf.policy == WritePolicy::NoOverwrite => Action::Skip,
            Some(bytes) if bytes.as_slice() == contents.as_bytes() => Action::Identical,
            Some(_) => Action::Overwrite,
        };

        if !opts.pretend {
            match action {
                Action::Create => {
                    write_file(&path, &contents)?;
                    trx.add_operation(RollbackOperation::RemoveFile(path.clone()));
                }
                Action::Overwrite => {
                    write_file(&path, &contents)?;
                    if let Some(bytes) = previous {
                        trx.add_operation(RollbackOperation::RestoreFile(path.clone(), bytes));
                    }
                }
                _ => {}
            }
        }

        record(action, &path, &mut reports);
    }

    for (relative, leaf) in &files {
        let FileOp::SymlinkTo(target) = &leaf.op else {
            continue;
        };

        let path = root.join(relative);
        let metadata = fs::symlink_metadata(&path).ok();

        if metadata.is_some() && leaf.policy == WritePolicy::NoOverwrite {
            record(Action::Skip, &path, &mut reports);
            continue;
        }

        let regular_file = metadata.is_some_and(|m| m.is_file());
        if regular_file && opts.force && !opts.pretend {
            let bytes = fs::read(&path).on_path(FileOperation::Read, &path)?;
            trx.add_operation(RollbackOperation::RestoreFile(path.clone(), bytes));
        }

        let link_target = relative_target(Path::new(relative), target);
        make_link(&path, &link_target, opts)?;

        if !opts.pretend {
            trx.add_operation(RollbackOperation::RemoveFile(path.clone()));
        }

        record(Action::Symlink, &path, &mut reports);
    }

    log::debug!("materialized {} entries", reports.len());

    trx.commit();

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{Leaf, Node};

    fn project() -> Structure {
        let mut structure = Structure::new();
        structure::insert(&mut structure, "README.md", Node::File(Leaf::template("readme")));
        structure::insert(
            &mut structure,
            "CHANGELOG.md",
            Node::File(Leaf::text("# Changelog\n").no_overwrite()),
        );
        structure::insert(
            &mut structure,
            "docs/readme.md",
            Node::File(Leaf::symlink("README.md").no_overwrite()),
        );
        structure
    }

    fn actions(reports: &[Report]) -> Vec<Action> {
        reports.iter().map(|r| r.action).collect()
    }

    #[test]
    fn pretend_reports_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ScaffoldOpts {
            pretend: true,
            ..ScaffoldOpts::new(dir.path().join("proj"))
        };

        let reports = materialize(&project(), &opts, &Templates::builtin().unwrap()).unwrap();

        assert_eq!(
            actions(&reports),
            vec![Action::Create, Action::Create, Action::Symlink]
        );
        assert!(!dir.path().join("proj").exists());
    }

    #[cfg(unix)]
    #[test]
    fn writes_files_then_links() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ScaffoldOpts::new(dir.path().join("proj"));
        let templates = Templates::builtin().unwrap();

        materialize(&project(), &opts, &templates).unwrap();

        let root = dir.path().join("proj");
        assert!(fs::read_to_string(root.join("README.md"))
            .unwrap()
            .starts_with("# proj"));
        assert_eq!(
            fs::read_link(root.join("docs/readme.md")).unwrap(),
            PathBuf::from("../README.md")
        );
    }

    #[cfg(unix)]
    #[test]
    fn second_run_skips_and_keeps_edits() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ScaffoldOpts::new(dir.path().join("proj"));
        let templates = Templates::builtin().unwrap();
        materialize(&project(), &opts, &templates).unwrap();

        let changelog = dir.path().join("proj/CHANGELOG.md");
        fs::write(&changelog, "# Changelog\n\n## 0.2\n").unwrap();

        let reports = materialize(&project(), &opts, &templates).unwrap();

        assert_eq!(
            actions(&reports),
            vec![Action::Identical, Action::Skip, Action::Skip]
        );
        assert_eq!(
            fs::read_to_string(&changelog).unwrap(),
            "# Changelog\n\n## 0.2\n"
        );
    }

    #[test]
    fn failure_rolls_back_created_files() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ScaffoldOpts::new(dir.path().join("proj"));
        let mut structure = project();
        structure::insert(
            &mut structure,
            "docs/index.md",
            Node::File(Leaf::template("does-not-exist")),
        );

        let result = materialize(&structure, &opts, &Templates::builtin().unwrap());

        assert!(matches!(result, Err(MaterializeError::Template(_))));
        assert!(!dir.path().join("proj").exists());
    }

    #[test]
    fn contentless_leaf_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ScaffoldOpts::new(dir.path().join("proj"));
        let mut structure = Structure::new();
        let mut leaf = Leaf::symlink("README.md");
        leaf.op = FileOp::Overwrite;
        structure::insert(&mut structure, "docs/readme.md", Node::File(leaf));

        let result = materialize(&structure, &opts, &Templates::builtin().unwrap());

        assert!(matches!(
            result,
            Err(MaterializeError::Structure(StructureError::ContentlessLeaf { .. }))
        ));
    }
}
