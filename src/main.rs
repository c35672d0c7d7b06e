use anyhow::Result;
use clap::Parser;
use tracing::warn;

use chunkheat::cli::{self, Cli};
use chunkheat::error::ChunkheatError;
use chunkheat::log_error;
use chunkheat::logging::{cleanup_old_logs, init_logging, log_system_info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = init_logging(&config.logging)?;
    log_system_info();

    if let Err(e) = cleanup_old_logs(&config.logging) {
        warn!("Could not clean up old logs: {}", e);
    }

    if let Err(error) = cli::run(cli.command, config).await {
        match error.downcast_ref::<ChunkheatError>() {
            Some(e) => {
                log_error!(e, "command failed");
                eprintln!("{}", e.user_message());
            }
            None => eprintln!("❌ {:#}", error),
        }
        std::process::exit(1);
    }

    Ok(())
}
