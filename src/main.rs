use clap::Parser;
use tracing_subscriber::EnvFilter;

use fits_polish::cli::{Cli, Commands};
use fits_polish::commands::{classify_object, process_file, show_defaults};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Process(args) => {
            let result = process_file(&args)?;
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Classify { name } => {
            classify_object(&name)?;
        }
        Commands::Defaults { target } => {
            show_defaults(&target)?;
        }
    }

    Ok(())
}
