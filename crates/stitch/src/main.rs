use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{LevelFilter, debug};
use stitch::{
    config::Config,
    linker::{check_dir, run_build},
};

/// Inline shared ES module chunks into self-contained browser scripts
#[derive(Parser, Debug)]
#[command(name = "stitch", version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Link a bundler output directory into standalone entry scripts
    Build(BuildArgs),
    /// Check already linked scripts for leftover module syntax
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Configuration file (defaults to ./stitch.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the bundler's chunks
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory to write the linked entries to (defaults to the input directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Entry chunk relative to the input directory; may be repeated
    #[arg(short, long = "entry", value_name = "FILE")]
    entries: Vec<String>,

    /// Fail when an import names something the shared chunk does not export
    #[arg(long)]
    strict_aliases: bool,

    /// Skip the structural checks on the linked output
    #[arg(long)]
    no_verify: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Directory of linked scripts
    dir: PathBuf,

    /// Only check these files; may be repeated
    #[arg(short, long = "entry", value_name = "FILE")]
    entries: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Command::Build(args) => build(args),
        Command::Check(args) => check_dir(&args.dir, &args.entries).map(|_| ()),
    }
}

fn build(args: BuildArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&env::current_dir()?)?,
    };

    if let Some(input) = args.input {
        config.input_dir = input;
    }
    if let Some(output) = args.output {
        config.output_dir = Some(output);
    }
    if !args.entries.is_empty() {
        config.entries = args.entries;
    }
    if args.strict_aliases {
        config.strict_aliases = true;
    }
    if args.no_verify {
        config.verify = false;
    }
    debug!("Effective configuration: {config:?}");

    run_build(&config)?;
    Ok(())
}

/// `RUST_LOG` takes precedence over the verbosity flags
fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}
