//! Line based surgery on the configuration files of a generated project.
//!
//! None of these parse their input into a document model. The files they touch are
//! generated from known blueprints and keep a restricted layout, so locating a
//! handful of marker lines is enough; every line that is not touched comes out
//! byte for byte as it went in.
use miette::Diagnostic;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PatchError {
    #[error("section [{section}] not found")]
    #[diagnostic(
        code(kopye_markdown::patch::missing_section),
        help("The blueprint's metadata file is expected to have this section")
    )]
    MissingSection { section: String },

    #[error("key '{key}' not found in section [{section}]")]
    #[diagnostic(code(kopye_markdown::patch::missing_key))]
    MissingKey { section: String, key: String },

    #[error("no line matching '{marker}' found")]
    #[diagnostic(
        code(kopye_markdown::patch::missing_marker),
        help("The file does not have the layout the blueprint normally generates")
    )]
    MissingMarker { marker: String },
}

lazy_static::lazy_static! {
    static ref SECTION_HEADER: Regex =
        Regex::new(r"^\s*\[(?P<name>[^\]]+)\]").expect("a valid regex pattern");
    static ref LONG_DESCRIPTION: Regex =
        Regex::new(r"^long[-_]description\s*[=:]").expect("a valid regex pattern");
    static ref CONTENT_TYPE: Regex =
        Regex::new(r"^long[-_]description[-_]content[-_]type\s*[=:]")
            .expect("a valid regex pattern");
    static ref SOURCE_SUFFIX: Regex =
        Regex::new(r"^source_suffix\s*=").expect("a valid regex pattern");
    static ref EXTENSIONS: Regex =
        Regex::new(r"^extensions\s*=").expect("a valid regex pattern");
}

const METADATA_SECTION: &str = "metadata";
const DESCRIPTION_KEY: &str = "long_description";
const CONTENT_TYPE_KEY: &str = "long_description_content_type";

/// Keeps a carriage return the original line had.
fn with_line_ending(original: &str, line: String) -> String {
    if original.ends_with('\r') {
        line + "\r"
    } else {
        line
    }
}

/// Indented, non blank lines following a key belong to its value.
fn is_continuation(line: &str) -> bool {
    line.starts_with([' ', '\t']) && !line.trim().is_empty()
}

/// Points the package metadata's long description at `description` and declares its
/// content type.
///
/// Both `long-description` and `long_description` spellings are recognised; the output
/// always uses underscores. An existing content type entry is rewritten where it
/// stands, otherwise one is added right after the description. Duplicate entries of
/// either key are dropped.
pub fn add_long_desc(
    content: &str,
    description: &str,
    content_type: &str,
) -> Result<String, PatchError> {
    let lines: Vec<&str> = content.split('\n').collect();

    let start = lines
        .iter()
        .position(|line| {
            SECTION_HEADER
                .captures(line)
                .is_some_and(|caps| caps["name"].trim() == METADATA_SECTION)
        })
        .ok_or_else(|| PatchError::MissingSection {
            section: METADATA_SECTION.to_string(),
        })?;

    let end = lines[start + 1..]
        .iter()
        .position(|line| SECTION_HEADER.is_match(line))
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len());

    let section = &lines[start + 1..end];

    if !section.iter().any(|line| LONG_DESCRIPTION.is_match(line)) {
        return Err(PatchError::MissingKey {
            section: METADATA_SECTION.to_string(),
            key: DESCRIPTION_KEY.to_string(),
        });
    }
    let has_content_type = section.iter().any(|line| CONTENT_TYPE.is_match(line));

    let description_line = format!("{DESCRIPTION_KEY} = {description}");
    let content_type_line = format!("{CONTENT_TYPE_KEY} = {content_type}");

    let mut patched: Vec<String> = lines[..=start].iter().map(|l| l.to_string()).collect();
    let mut seen_description = false;
    let mut seen_content_type = false;
    let mut skipping_value = false;

    for line in section {
        if skipping_value && is_continuation(line) {
            continue;
        }
        skipping_value = false;

        if LONG_DESCRIPTION.is_match(line) {
            skipping_value = true;
            if seen_description {
                continue;
            }
            seen_description = true;
            patched.push(with_line_ending(line, description_line.clone()));
            if !has_content_type {
                patched.push(with_line_ending(line, content_type_line.clone()));
            }
        } else if CONTENT_TYPE.is_match(line) {
            skipping_value = true;
            if seen_content_type {
                continue;
            }
            seen_content_type = true;
            patched.push(with_line_ending(line, content_type_line.clone()));
        } else {
            patched.push(line.to_string());
        }
    }

    patched.extend(lines[end..].iter().map(|l| l.to_string()));

    Ok(patched.join("\n"))
}

/// Tracks bracket depth across lines, ignoring brackets inside string literals.
fn bracket_delta(line: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in line.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '#' => break,
            '\'' | '"' => quote = Some(ch),
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            _ => {}
        }
    }

    depth
}

/// Index of the line closing the expression that starts at `start`.
fn end_of_expression(lines: &[String], start: usize) -> Option<usize> {
    let mut depth = 0;

    for (index, line) in lines.iter().enumerate().skip(start) {
        depth += bracket_delta(line);
        if depth <= 0 {
            return Some(index);
        }
    }

    None
}

/// Enables Markdown sources in a Sphinx `conf.py`.
///
/// The `source_suffix` assignment is rewritten to list `suffixes`, `block` is inserted
/// in front of it (above any comment lines directly attached to it) and `extension`
/// is appended to the `extensions` list right after the line that closes the list.
/// Re-applying the patch to its own output changes nothing.
pub fn add_sphinx_md(
    content: &str,
    suffixes: &[String],
    extension: &str,
    block: &str,
) -> Result<String, PatchError> {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

    let suffix_start = lines
        .iter()
        .position(|line| SOURCE_SUFFIX.is_match(line))
        .ok_or_else(|| PatchError::MissingMarker {
            marker: "source_suffix =".to_string(),
        })?;
    let suffix_end =
        end_of_expression(&lines, suffix_start).ok_or_else(|| PatchError::MissingMarker {
            marker: "end of source_suffix".to_string(),
        })?;

    let quoted: Vec<String> = suffixes.iter().map(|s| format!("'{s}'")).collect();
    let suffix_line = with_line_ending(
        &lines[suffix_start],
        format!("source_suffix = [{}]", quoted.join(", ")),
    );
    lines.splice(suffix_start..=suffix_end, [suffix_line]);

    let block_marker = block.lines().find(|line| !line.trim().is_empty());
    let has_block = block_marker.is_some_and(|marker| lines.iter().any(|line| line == marker));

    if !has_block {
        let mut at = suffix_start;
        while at > 0 && lines[at - 1].trim_start().starts_with('#') {
            at -= 1;
        }
        let block_lines: Vec<String> = block.lines().map(str::to_string).collect();
        lines.splice(at..at, block_lines);
    }

    let ext_start = lines
        .iter()
        .position(|line| EXTENSIONS.is_match(line))
        .ok_or_else(|| PatchError::MissingMarker {
            marker: "extensions =".to_string(),
        })?;
    let ext_end =
        end_of_expression(&lines, ext_start).ok_or_else(|| PatchError::MissingMarker {
            marker: "end of extensions list".to_string(),
        })?;

    let double = format!("\"{extension}\"");
    let single = format!("'{extension}'");
    let registered = lines[ext_start..=ext_end]
        .iter()
        .chain(
            lines
                .iter()
                .filter(|line| line.trim_start().starts_with("extensions.append(")),
        )
        .any(|line| line.contains(&double) || line.contains(&single));

    if !registered {
        lines.insert(ext_end + 1, format!("extensions.append({double})"));
    }

    Ok(lines.join("\n"))
}

/// Merges `required` packages into a requirements file.
///
/// Comment lines at the top are kept as they are. Everything after them, plus every
/// required package not already mentioned anywhere in `existing`, is sorted. The result
/// always ends with a newline, even when there is nothing to list.
pub fn add_requirements(existing: &str, required: &[String]) -> String {
    let lines: Vec<&str> = existing.lines().collect();
    let header_len = lines
        .iter()
        .take_while(|line| line.trim_start().starts_with('#'))
        .count();

    let mut body: Vec<String> = lines[header_len..]
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim_end().to_string())
        .collect();

    for package in required {
        if !existing.contains(package.as_str()) && !body.contains(package) {
            body.push(package.clone());
        }
    }

    body.sort();

    let mut merged = String::new();
    for line in lines[..header_len].iter().copied().chain(body.iter().map(String::as_str)) {
        merged.push_str(line);
        merged.push('\n');
    }

    if merged.is_empty() {
        merged.push('\n');
    }

    merged
}

/// Activates the docs requirements file in a `tox.ini`.
///
/// The generated `tox.ini` ships the reference commented out; the line mentioning
/// `requirements` is replaced by an active `-r` entry.
pub fn link_tox_requirements(content: &str, requirements: &str) -> Result<String, PatchError> {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let index = lines
        .iter()
        .position(|line| line.contains(requirements))
        .ok_or_else(|| PatchError::MissingMarker {
            marker: requirements.to_string(),
        })?;

    lines[index] = format!("    -r {requirements}");

    let mut patched = lines.join("\n");
    patched.push('\n');

    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = "file: README.md";
    const CONTENT_TYPE: &str = "text/markdown; charset=UTF-8; variant=GFM";

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.lines().filter(|line| line.starts_with(needle)).count()
    }

    #[test]
    fn long_desc_normalizes_every_spelling() {
        let variants = [
            "[metadata]\nname = x\nlong-description = file: README.rst\nurl = u\n",
            "[metadata]\nname = x\nlong_description = file: README.rst\nurl = u\n",
            "[metadata]\nname = x\nlong-description = file: README.rst\nlong-description-content-type = text/x-rst; charset=UTF-8\nurl = u\n",
            "[metadata]\nname = x\nlong_description = file: README.rst\nlong_description_content_type = text/x-rst; charset=UTF-8\nurl = u\n",
        ];

        for input in variants {
            let patched = add_long_desc(input, DESCRIPTION, CONTENT_TYPE).unwrap();

            assert_eq!(count(&patched, "long_description ="), 1, "{patched}");
            assert_eq!(count(&patched, "long_description_content_type ="), 1, "{patched}");
            assert_eq!(count(&patched, "long-"), 0, "{patched}");
            assert!(patched.contains("long_description = file: README.md\n"));
            assert!(patched.contains(
                "long_description_content_type = text/markdown; charset=UTF-8; variant=GFM\n"
            ));
            assert!(patched.starts_with("[metadata]\nname = x\n"));
            assert!(patched.ends_with("url = u\n"));
        }
    }

    #[test]
    fn long_desc_adds_content_type_right_after_description() {
        let input = "[metadata]\nlong_description = file: README.rst\nurl = u";
        let patched = add_long_desc(input, DESCRIPTION, CONTENT_TYPE).unwrap();

        assert_eq!(
            patched,
            "[metadata]\nlong_description = file: README.md\nlong_description_content_type = text/markdown; charset=UTF-8; variant=GFM\nurl = u"
        );
    }

    #[test]
    fn long_desc_leaves_other_sections_alone() {
        let input = "[options]\nlong_description = keep\n\n[metadata]\nlong-description = old\n    continued\n\n[tool]\nlong-description = keep too\n";
        let patched = add_long_desc(input, DESCRIPTION, CONTENT_TYPE).unwrap();

        assert!(patched.starts_with("[options]\nlong_description = keep\n\n[metadata]\n"));
        assert!(patched.ends_with("\n\n[tool]\nlong-description = keep too\n"));
        assert!(!patched.contains("continued"));
    }

    #[test]
    fn long_desc_is_stable_on_its_own_output() {
        let input = "[metadata]\nlong-description = file: README.rst\n";
        let once = add_long_desc(input, DESCRIPTION, CONTENT_TYPE).unwrap();
        let twice = add_long_desc(&once, DESCRIPTION, CONTENT_TYPE).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn long_desc_requires_section_and_key() {
        assert!(matches!(
            add_long_desc("[options]\nzip_safe = False\n", DESCRIPTION, CONTENT_TYPE),
            Err(PatchError::MissingSection { .. })
        ));
        assert!(matches!(
            add_long_desc("[metadata]\nname = x\n", DESCRIPTION, CONTENT_TYPE),
            Err(PatchError::MissingKey { .. })
        ));
    }

    const CONF_PY: &str = "import os\n\nextensions = [\n    'sphinx.ext.autodoc',\n    'sphinx.ext.intersphinx',\n]\n\n# The suffix of source filenames.\nsource_suffix = '.rst'\n\nmaster_doc = 'index'\n";

    fn suffixes() -> Vec<String> {
        vec![".rst".to_string(), ".md".to_string()]
    }

    #[test]
    fn sphinx_md_patches_suffix_block_and_extensions() {
        let block = "# -- markdown --\nMARKDOWN = True\n";
        let patched = add_sphinx_md(CONF_PY, &suffixes(), "recommonmark", block).unwrap();

        assert_eq!(
            patched,
            "import os\n\nextensions = [\n    'sphinx.ext.autodoc',\n    'sphinx.ext.intersphinx',\n]\nextensions.append(\"recommonmark\")\n\n# -- markdown --\nMARKDOWN = True\n# The suffix of source filenames.\nsource_suffix = ['.rst', '.md']\n\nmaster_doc = 'index'\n"
        );
    }

    #[test]
    fn sphinx_md_never_splits_a_multiline_list() {
        let conf = "extensions = ['a',\n              'b',  # trailing ]\n              'c]']\nsource_suffix = '.rst'\n";
        let patched = add_sphinx_md(conf, &suffixes(), "recommonmark", "# md").unwrap();

        let lines: Vec<&str> = patched.lines().collect();
        assert_eq!(lines[2], "              'c]']");
        assert_eq!(lines[3], "extensions.append(\"recommonmark\")");
    }

    #[test]
    fn sphinx_md_is_stable_on_its_own_output() {
        let block = crate::templates::AUTO_STRUCTIFY;
        let once = add_sphinx_md(CONF_PY, &suffixes(), "recommonmark", block).unwrap();
        let twice = add_sphinx_md(&once, &suffixes(), "recommonmark", block).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn sphinx_md_requires_markers() {
        let no_suffix = "extensions = []\n";
        let no_extensions = "source_suffix = '.rst'\n";

        assert!(matches!(
            add_sphinx_md(no_suffix, &suffixes(), "recommonmark", "# md"),
            Err(PatchError::MissingMarker { .. })
        ));
        assert!(matches!(
            add_sphinx_md(no_extensions, &suffixes(), "recommonmark", "# md"),
            Err(PatchError::MissingMarker { .. })
        ));
    }

    #[test]
    fn requirements_keep_header_and_sort_the_rest() {
        let merged = add_requirements("# header\nzeta\nalpha\n", &["beta".to_string()]);

        assert_eq!(merged, "# header\nalpha\nbeta\nzeta\n");
    }

    #[test]
    fn empty_requirements_still_end_with_a_newline() {
        assert_eq!(add_requirements("", &[]), "\n");
        assert_eq!(add_requirements("\n\n", &[]), "\n");
    }

    #[test]
    fn requirements_are_not_duplicated() {
        let required = vec!["recommonmark".to_string()];
        let once = add_requirements("", &required);
        let twice = add_requirements(&once, &required);

        assert_eq!(once, "recommonmark\n");
        assert_eq!(twice, once);
        assert_eq!(
            add_requirements("recommonmark>=0.7\nsphinx", &required),
            "recommonmark>=0.7\nsphinx\n"
        );
    }

    #[test]
    fn tox_requirements_get_activated() {
        let tox = "[testenv:docs]\ndeps =\n#    -r {toxinidir}/docs/requirements.txt\ncommands = sphinx-build";
        let patched = link_tox_requirements(tox, "docs/requirements.txt").unwrap();

        assert_eq!(
            patched,
            "[testenv:docs]\ndeps =\n    -r docs/requirements.txt\ncommands = sphinx-build\n"
        );
        assert!(matches!(
            link_tox_requirements("[tox]\n", "docs/requirements.txt"),
            Err(PatchError::MissingMarker { .. })
        ));
    }
}
