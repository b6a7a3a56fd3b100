//! panelsync CLI entry point.

use clap::Parser;

use panelsync::cli::commands::{check, init, insights, sweep};
use panelsync::cli::{handle_error, Cli, Commands};
use panelsync::infrastructure::config::ConfigLoader;
use panelsync::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let json = cli.json;
    let result = match cli.command {
        Commands::Init(args) => init::execute(args, config, json).await,
        Commands::Sweep(args) => sweep::execute_sweep(args, config, json).await,
        Commands::Daemon(args) => sweep::execute_daemon(args, config, json).await,
        Commands::CheckVariation(args) => check::execute_check(args, config, json).await,
        Commands::EnqueueCheck(args) => check::execute_enqueue(args, config, json).await,
        Commands::Finalize(args) => check::execute_finalize(args, config, json).await,
        Commands::Insights(args) => insights::execute(args, config, json).await,
    };

    if let Err(err) = result {
        handle_error(err, json);
    }
}
