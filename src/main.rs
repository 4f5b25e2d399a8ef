// Entrypoint for the CLI application.
// - Loads `.env`, parses flags, sets up logging, then runs the download.
// - Usage errors exit with clap's code; any fatal phase error exits with 1.

use clap::Parser;
use infinitome_dl::{
    api::ApiClient,
    config::{Cli, Config},
    logging, ui,
};
use tracing::{error, info};

fn main() {
    // A missing .env is fine; a broken one is worth a warning.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env file: {e}");
        }
    }

    let config = match Config::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(e) => e.exit(),
    };

    if let Err(e) = logging::init(config.log_file.as_deref()) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run(&config) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let api = ApiClient::new(config)?;
    let summary = ui::run(&api, config)?;
    info!(
        listed = summary.listed,
        downloaded = summary.downloaded,
        failed = summary.failed,
        "finished"
    );
    Ok(())
}
