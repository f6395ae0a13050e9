use clap::{
    crate_authors, crate_description, crate_name, crate_version, Arg, ArgAction, ArgMatches,
    Command,
};
use colored::Colorize;
use kopye_markdown::{api, options::ScaffoldOpts};
use miette::miette;
use std::path::PathBuf;

// The CLI layer should only parse inputs and forward them to library code.
fn main() -> miette::Result<()> {
    let matches = Command::new(crate_name!())
        .about(crate_description!())
        .author(crate_authors!())
        .version(crate_version!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("new")
                .about("Generates a project from a blueprint, with Markdown docs")
                .arg(
                    Arg::new("blueprint")
                        .help("Directory holding the files of the project to generate")
                        .required(true),
                )
                .arg(
                    Arg::new("destination")
                        .help("The destination directory where the project will be created")
                        .required(true),
                )
                .arg(
                    Arg::new("name")
                        .long("name")
                        .help("Project name, defaults to the destination directory name"),
                )
                .arg(
                    Arg::new("package")
                        .long("package")
                        .help("Package name, defaults to the project name"),
                )
                .arg(
                    Arg::new("set")
                        .long("set")
                        .value_name("KEY=VALUE")
                        .help("Additional template variable")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("update")
                        .long("update")
                        .help("Update an existing project, keeping files that already exist")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Overwrite existing files and links")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("pretend")
                        .long("pretend")
                        .help("Show what would happen without touching the filesystem")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .help("Do not ask for confirmation")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("FILE")
                        .help("TOML file overriding the Markdown conversion"),
                )
                .arg(
                    Arg::new("no-markdown")
                        .long("no-markdown")
                        .help("Keep the reStructuredText docs")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("config"),
                ),
        )
        .subcommand(
            Command::new("patch-requirements")
                .about("Adds packages to a requirements file, keeping it sorted")
                .arg(Arg::new("file").help("requirements file").required(true))
                .arg(
                    Arg::new("packages")
                        .help("packages to require")
                        .required(true)
                        .num_args(1..),
                ),
        )
        .get_matches();

    let is_verbose = matches.get_flag("verbose");

    env_logger::Builder::new()
        .filter_level(if is_verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    match matches.subcommand() {
        Some(("new", args)) => handle_new(args),
        Some(("patch-requirements", args)) => handle_patch_requirements(args),
        _ => unreachable!(),
    }
}

fn parse_assignment(raw: &str) -> miette::Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(miette!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn handle_new(args: &ArgMatches) -> miette::Result<()> {
    let Some(blueprint) = args.get_one::<String>("blueprint") else {
        return Err(miette!("blueprint required"));
    };
    let Some(destination) = args.get_one::<String>("destination") else {
        return Err(miette!("destination required"));
    };

    let mut opts = ScaffoldOpts::new(destination);
    opts.blueprint = Some(PathBuf::from(blueprint));
    opts.update = args.get_flag("update");
    opts.force = args.get_flag("force");
    opts.pretend = args.get_flag("pretend");
    opts.log = true;

    if let Some(name) = args.get_one::<String>("name") {
        opts.name = name.clone();
        opts.package = name.replace('-', "_");
    }
    if let Some(package) = args.get_one::<String>("package") {
        opts.package = package.clone();
    }
    for raw in args.get_many::<String>("set").unwrap_or_default() {
        let (key, value) = parse_assignment(raw)?;
        opts.extra.insert(key, value);
    }

    let conversion = if args.get_flag("no-markdown") {
        None
    } else {
        let config = args.get_one::<String>("config").map(PathBuf::from);
        Some(api::load_conversion(config.as_deref())?)
    };

    match api::new_project(&opts, conversion, args.get_flag("yes"))? {
        Some(reports) if opts.pretend => {
            println!("{} {} entries", "pretended".bright_blue(), reports.len());
        }
        Some(_) => {
            println!("{} {}", "done".bright_green(), opts.project_path.display());
        }
        None => {
            println!("{}", "canceled".yellow());
        }
    }

    Ok(())
}

fn handle_patch_requirements(args: &ArgMatches) -> miette::Result<()> {
    let Some(file) = args.get_one::<String>("file") else {
        return Err(miette!("file required"));
    };
    let packages: Vec<String> = args
        .get_many::<String>("packages")
        .unwrap_or_default()
        .cloned()
        .collect();

    api::patch_requirements(PathBuf::from(file).as_path(), &packages)?;

    Ok(())
}
