use anyhow::Context;
use clap::Parser;
use std::time::Duration;

use nexa_topology::cli::{Cli, CliHandler, Commands};
use nexa_topology::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let handler = CliHandler::new(cli.config);

    match cli.command {
        Commands::Refresh { deadline_ms, format, report } => {
            let config = handler
                .load_config()
                .with_context(|| format!("loading {}", handler.config_path().display()))?;
            logging::init(&config.logging)?;

            let report_data = handler
                .refresh(&config, deadline_ms.map(Duration::from_millis))
                .await?;
            print!("{}", CliHandler::render(&report_data, format, report)?);
        }
        Commands::Check => {
            handler.check()?;
        }
        Commands::Init { force } => {
            handler.init(force)?;
        }
    }

    Ok(())
}
