// trimsaw-cli/src/main.rs
//
// Binary entry point: parses arguments, initializes logging and
// dispatches to the subcommand implementations.

use std::process;

use clap::Parser;

use trimsaw_cli::{Cli, Commands, logging, terminal};

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_dir = match &cli.command {
        Commands::Trim(args) => args.log_dir.clone(),
        Commands::Probe(_) => None,
    };
    logging::init(cli.verbose, log_dir.as_deref())?;

    match cli.command {
        Commands::Trim(args) => trimsaw_cli::run_trim(args)?,
        Commands::Probe(args) => trimsaw_cli::run_probe(args)?,
    }
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        terminal::print_error(&err.to_string());
        process::exit(1);
    }
}
