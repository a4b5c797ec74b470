//! Cadence CLI entry point.

use clap::Parser;

use cadence::cli::commands;
use cadence::cli::{handle_error, Cli, Commands};
use cadence::{ConfigLoader, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, &config, cli.json).await,
        Commands::Run(args) => commands::run::execute(args, config, cli.json).await,
        Commands::Task(args) => commands::task::execute(args, config, cli.json).await,
        Commands::Trigger(args) => commands::trigger::execute(args, config, cli.json).await,
        Commands::Module(args) => commands::module::execute(args, config, cli.json).await,
        Commands::Inbox(args) => commands::inbox::execute(args, config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
