use crate::structure::{FileOp, Node, Structure};
use colored::Colorize;
use std::path::Path;

/// Prints one entry and recurses into directories.
fn print_tree(name: &str, node: &Node, prefix: &str, is_last: bool) {
    let connector = if is_last {
        "└── ".yellow()
    } else {
        "├── ".yellow()
    };

    let label = match node {
        Node::Dir(_) => name.blue().to_string(),
        Node::File(leaf) => match &leaf.op {
            FileOp::SymlinkTo(target) => {
                format!("{} -> {}", name.cyan(), target.display())
            }
            FileOp::NoOp => name.dimmed().to_string(),
            FileOp::Overwrite => name.green().to_string(),
        },
    };
    println!("{}{}{}", prefix.yellow(), connector, label);

    if let Node::Dir(children) = node {
        let child_prefix = if is_last {
            format!("{}    ", prefix)
        } else {
            format!("{}│   ", prefix)
        };
        print_children(children, &child_prefix);
    }
}

fn print_children(structure: &Structure, prefix: &str) {
    let len = structure.len();
    for (i, (name, node)) in structure.iter().enumerate() {
        print_tree(name, node, prefix, i == len - 1);
    }
}

/// Shows what is about to be generated below `destination`.
pub fn preview_as_tree(structure: &Structure, destination: &Path) {
    let root_name = destination
        .file_name()
        .map(|os| os.to_string_lossy().to_string())
        .unwrap_or_else(|| destination.display().to_string());

    println!(
        "Legend: {} = (directory), {} = (file), {} = (link)",
        "blue".blue(),
        "green".green(),
        "cyan".cyan()
    );

    println!(
        "{} {}\n",
        "┌─".bold().bright_blue(),
        "Preview".bold().bright_blue(),
    );

    println!("{}{}", "└── ".yellow(), root_name.blue());
    print_children(structure, "    ");
    println!();
}
