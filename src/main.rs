use clap::Parser;
use color_eyre::eyre::{Report, Result};
use hitmap::{cli, Cli};

fn main() -> Result<(), Report> {
    // Parse CLI parameters
    let args = Cli::parse();

    // initialize color_eyre crate for colorized logs
    color_eyre::install()?;

    // Set logging/verbosity level via RUST_LOG
    std::env::set_var("RUST_LOG", args.verbosity.to_string());

    // initialize env_logger crate for logging/verbosity level
    env_logger::init();

    // check which CLI command we're running (run, check)
    match args.command {
        cli::Command::Run(args) => hitmap::run::run(&args)?,
        cli::Command::Check(args) => cli::check(&args)?,
    }

    Ok(())
}
