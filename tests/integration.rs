// Integration testing can be done either by calling library functions directly or by invoking your CLI as a subprocess.
use assert_cmd::Command;
use predicates::prelude::*;
use std::{fs, path::Path};

const SETUP_CFG: &str = "\
[metadata]
name = {{ name }}
description = Add a short description here!
long-description = file: README.rst
long-description-content-type = text/x-rst; charset=UTF-8
url = https://example.com

[options]
packages = find_namespace:
";

const CONF_PY: &str = "\
import os

extensions = [
    \"sphinx.ext.autodoc\",
    \"sphinx.ext.todo\",
]

# The suffix of source filenames.
source_suffix = \".rst\"

master_doc = \"index\"
";

const TOX_INI: &str = "\
[testenv:docs]
deps =
    # -r {toxinidir}/docs/requirements.txt
commands =
    sphinx-build docs docs/_build
";

fn blueprint(root: &Path) {
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::create_dir_all(root.join("src/{{ package }}")).unwrap();
    fs::write(root.join("setup.cfg.tera"), SETUP_CFG).unwrap();
    fs::write(root.join("tox.ini"), TOX_INI).unwrap();
    fs::write(root.join("README.rst"), "readme\n======\n").unwrap();
    fs::write(root.join("AUTHORS.rst"), "authors\n").unwrap();
    fs::write(root.join("CHANGELOG.rst"), "changelog\n").unwrap();
    fs::write(root.join("docs/conf.py"), CONF_PY).unwrap();
    fs::write(root.join("docs/index.rst"), "index\n").unwrap();
    fs::write(root.join("docs/requirements.txt"), "sphinx\n").unwrap();
    fs::write(root.join("src/{{ package }}/__init__.py"), "").unwrap();
}

fn cli() -> Command {
    Command::cargo_bin("kopye-markdown").unwrap()
}

#[test]
fn new_project_uses_markdown_docs() {
    let dir = tempfile::tempdir().unwrap();
    let bp = dir.path().join("blueprint");
    blueprint(&bp);
    let dest = dir.path().join("my-project");

    cli()
        .arg("new")
        .arg(&bp)
        .arg(&dest)
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"));

    assert!(dest.join("README.md").is_file());
    assert!(dest.join("docs/index.md").is_file());
    assert!(dest.join("src/my_project/__init__.py").is_file());
    assert!(!dest.join("README.rst").exists());
    assert!(!dest.join("docs/index.rst").exists());

    let setup = fs::read_to_string(dest.join("setup.cfg")).unwrap();
    assert!(setup.contains("name = my-project"));
    assert!(setup.contains("long_description = file: README.md"));
    assert!(setup
        .contains("long_description_content_type = text/markdown; charset=UTF-8; variant=GFM"));

    let conf = fs::read_to_string(dest.join("docs/conf.py")).unwrap();
    assert!(conf.contains("source_suffix = ['.rst', '.md']"));
    assert!(conf.contains("extensions.append(\"recommonmark\")"));

    assert_eq!(
        fs::read_to_string(dest.join("docs/requirements.txt")).unwrap(),
        "recommonmark\nsphinx\n"
    );
    assert!(fs::read_to_string(dest.join("tox.ini"))
        .unwrap()
        .contains("    -r docs/requirements.txt\n"));
}

#[cfg(unix)]
#[test]
fn docs_link_to_top_level_documents() {
    let dir = tempfile::tempdir().unwrap();
    let bp = dir.path().join("blueprint");
    blueprint(&bp);
    let dest = dir.path().join("proj");

    cli().arg("new").arg(&bp).arg(&dest).arg("--yes").assert().success();

    let link = dest.join("docs/readme.md");
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&link).unwrap(), Path::new("../README.md"));
    assert_eq!(
        fs::read_to_string(&link).unwrap(),
        fs::read_to_string(dest.join("README.md")).unwrap()
    );
}

#[test]
fn pretend_leaves_destination_alone() {
    let dir = tempfile::tempdir().unwrap();
    let bp = dir.path().join("blueprint");
    blueprint(&bp);
    let dest = dir.path().join("proj");

    cli()
        .arg("new")
        .arg(&bp)
        .arg(&dest)
        .arg("--pretend")
        .assert()
        .success()
        .stdout(predicate::str::contains("README.md"))
        .stdout(predicate::str::contains("pretended"));

    assert!(!dest.exists());
}

#[test]
fn existing_destination_requires_update() {
    let dir = tempfile::tempdir().unwrap();
    let bp = dir.path().join("blueprint");
    blueprint(&bp);
    let dest = dir.path().join("proj");
    fs::create_dir_all(&dest).unwrap();

    cli()
        .arg("new")
        .arg(&bp)
        .arg(&dest)
        .arg("--yes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn update_keeps_edited_files() {
    let dir = tempfile::tempdir().unwrap();
    let bp = dir.path().join("blueprint");
    blueprint(&bp);
    let dest = dir.path().join("proj");

    cli().arg("new").arg(&bp).arg(&dest).arg("--yes").assert().success();

    fs::write(dest.join("README.md"), "# edited\n").unwrap();

    cli()
        .arg("new")
        .arg(&bp)
        .arg(&dest)
        .arg("--yes")
        .arg("--update")
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(dest.join("README.md")).unwrap(),
        "# edited\n"
    );
    assert!(!dest.join("README.rst").exists());
    assert!(!dest.join("AUTHORS.rst").exists());
    assert!(!dest.join("docs/index.rst").exists());
    let setup = fs::read_to_string(dest.join("setup.cfg")).unwrap();
    assert!(setup.contains("long_description = file: README.md"));
}

#[test]
fn no_markdown_keeps_rst() {
    let dir = tempfile::tempdir().unwrap();
    let bp = dir.path().join("blueprint");
    blueprint(&bp);
    let dest = dir.path().join("proj");

    cli()
        .arg("new")
        .arg(&bp)
        .arg(&dest)
        .arg("--yes")
        .arg("--no-markdown")
        .assert()
        .success();

    assert!(dest.join("README.rst").is_file());
    assert!(!dest.join("README.md").exists());
}

#[test]
fn patch_requirements_sorts_and_keeps_header() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("requirements.txt");
    fs::write(&file, "# header\nzeta\nalpha\n").unwrap();

    cli()
        .arg("patch-requirements")
        .arg(&file)
        .arg("beta")
        .arg("alpha")
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "# header\nalpha\nbeta\nzeta\n"
    );
}
