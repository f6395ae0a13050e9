use crate::{
    errors::{FileOperation, IoError, IoResultExt},
    materialize::{report, Action},
    options::ScaffoldOpts,
};
use miette::Diagnostic;
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LinkError {
    #[error("cannot link '{path}' => '{target}': '{path}' already exists")]
    #[diagnostic(
        code(kopye_markdown::link::already_exists),
        help("Remove the file or run again with --force to replace it")
    )]
    AlreadyExists { path: PathBuf, target: PathBuf },

    #[error("cannot link '{path}' => '{target}': the target does not exist")]
    #[diagnostic(
        code(kopye_markdown::link::target_missing),
        help("Links are created after regular files; check that the blueprint generates the target")
    )]
    TargetMissing { path: PathBuf, target: PathBuf },

    #[error("impossible to create a symbolic link '{path}' => '{target}'")]
    #[diagnostic(
        code(kopye_markdown::link::unsupported),
        help(
            "On non-POSIX systems make sure your user is allowed to create symbolic links \
             (run elevated or enable developer mode). See \
             https://github.com/git-for-windows/git/wiki/Symbolic-Links and \
             https://docs.microsoft.com/en-us/windows/win32/fileio/creating-symbolic-links"
        )
    )]
    SymlinkUnsupported {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error within link domain")]
    #[diagnostic(code(kopye_markdown::link::io))]
    Io(#[from] IoError),
}

#[cfg(unix)]
fn create_symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(windows)]
fn create_symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, path)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

/// Path of `target` as seen from the directory containing `link`.
///
/// Both arguments are relative to the same root, e.g. `docs/readme.md` pointing at
/// `README.md` gives `../README.md`.
pub fn relative_target(link: &Path, target: &Path) -> PathBuf {
    let normal = |path: &Path| -> Vec<PathBuf> {
        path.components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(PathBuf::from(part)),
                _ => None,
            })
            .collect()
    };

    let from = normal(link.parent().unwrap_or_else(|| Path::new("")));
    let to = normal(target);

    let shared = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut relative = PathBuf::new();
    for _ in shared..from.len() {
        relative.push("..");
    }
    for part in &to[shared..] {
        relative.push(part);
    }

    relative
}

/// Creates a symbolic link at `path` pointing to `target`.
///
/// `target` is interpreted relative to the directory of `path`, the way the link
/// itself will resolve it. When pretending nothing is touched and `path` is returned
/// as if the link had been made. An occupied `path` is only replaced with `force`.
pub fn make_link(path: &Path, target: &Path, opts: &ScaffoldOpts) -> Result<PathBuf, LinkError> {
    if opts.should_log() {
        report(Action::Symlink, path, Some(target));
    }

    if opts.pretend {
        log::info!("pretending to link {} => {}", path.display(), target.display());
        return Ok(path.to_path_buf());
    }

    let occupied = fs::symlink_metadata(path).is_ok();
    if occupied && !opts.force {
        return Err(LinkError::AlreadyExists {
            path: path.to_path_buf(),
            target: target.to_path_buf(),
        });
    }

    let resolved = path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(target);
    if !resolved.exists() {
        return Err(LinkError::TargetMissing {
            path: path.to_path_buf(),
            target: target.to_path_buf(),
        });
    }

    if occupied {
        log::debug!("removing {} before linking", path.display());
        fs::remove_file(path).on_path(FileOperation::Remove, path)?;
    }

    create_symlink(target, path).map_err(|error| LinkError::SymlinkUnsupported {
        path: path.to_path_buf(),
        target: target.to_path_buf(),
        source: error,
    })?;

    log::debug!("linked {} => {}", path.display(), target.display());

    Ok(path.to_path_buf())
}
