use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use http_input::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    init_tracing();

    match args.command {
        cli::Commands::Gather => commands::gather::once(&args.config).await?,
        cli::Commands::Run { interval } => commands::gather::run(&args.config, interval).await?,
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
    }

    Ok(())
}
