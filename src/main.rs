use clap::{Arg, ArgAction, ArgMatches, Command as ClapCommand};
use std::fs;
use std::path::{Path, PathBuf};

use golike::config::Config;
use golike::error::{Error, Result};
use golike::interpreter::ENTRY_PACKAGE;
use golike::lexer::Lexer;
use golike::module::{parse_source, ModuleSystem};
use golike::output::Output;
use golike::printer::print_program;
use tracing::debug;

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_count("verbose"));

    if let Err(e) = run(&matches) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn cli() -> ClapCommand {
    let file = || {
        Arg::new("file")
            .help("Source file")
            .required(true)
            .value_parser(clap::value_parser!(PathBuf))
    };

    ClapCommand::new("golike")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Interpreter for a statically-typed Go subset")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v, -vv, -vvv)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            ClapCommand::new("run")
                .about("Run the main package")
                .arg(
                    Arg::new("files")
                        .help("Source files of the main package")
                        .required(true)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("src-root")
                        .long("src-root")
                        .help("Directory imports are resolved against")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("max-call-depth")
                        .long("max-call-depth")
                        .help("Maximum nesting of function calls")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("JSON settings file")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            ClapCommand::new("tokens")
                .about("Print the token stream, one token per line")
                .arg(file()),
        )
        .subcommand(
            ClapCommand::new("ast")
                .about("Print the syntax tree")
                .arg(file())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Emit JSON instead of the debug form")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            ClapCommand::new("fmt")
                .about("Print the file in canonical form")
                .arg(file()),
        )
}

fn init_tracing(verbosity: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("run", args)) => run_program(args),
        Some(("tokens", args)) => {
            let source = read_source(file_arg(args))?;
            for token in Lexer::new(source) {
                println!("{}", token?);
            }
            Ok(())
        }
        Some(("ast", args)) => {
            let program = parse_source(&read_source(file_arg(args))?)?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&program)?);
            } else {
                println!("{:#?}", program);
            }
            Ok(())
        }
        Some(("fmt", args)) => {
            let program = parse_source(&read_source(file_arg(args))?)?;
            print!("{}", print_program(&program));
            Ok(())
        }
        _ => Ok(()),
    }
}

fn run_program(args: &ArgMatches) -> Result<()> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(depth) = args.get_one::<usize>("max-call-depth") {
        config.max_call_depth = *depth;
    }
    if let Some(root) = args.get_one::<PathBuf>("src-root") {
        config.src_root = Some(root.clone());
    }

    let files: Vec<&PathBuf> = args.get_many::<PathBuf>("files").into_iter().flatten().collect();

    // Entry files usually live in <src_root>/main/, so default to the grandparent.
    let src_root = config.src_root.clone().or_else(|| {
        files
            .first()
            .and_then(|file| file.parent())
            .and_then(Path::parent)
            .map(Path::to_path_buf)
    });
    debug!(?src_root, files = files.len(), "loading entry package");

    let mut modules = match src_root {
        Some(root) => ModuleSystem::with_src_root(root),
        None => ModuleSystem::new(),
    };
    for file in files {
        modules.load_file(ENTRY_PACKAGE, file)?;
    }

    let mut interpreter = golike::build(&mut modules, ENTRY_PACKAGE, config, Output::Stdout)?;
    interpreter.run_main()
}

fn file_arg(args: &ArgMatches) -> &Path {
    args.get_one::<PathBuf>("file")
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new(""))
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::from(e).in_file(path.display().to_string()))
}
