use anyhow::Result;
use clap::Parser;

use sysgrok_core::config::SysgrokConfig;
use sysgrok_daemon::cli::DaemonCli;
use sysgrok_daemon::logging;
use sysgrok_daemon::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = SysgrokConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;

    // CLI flags take precedence over the config file and environment
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    if let Some(pid_file) = cli.pid_file {
        config.general.pid_file = pid_file;
    }

    if cli.validate {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        println!("configuration ok: {}", cli.config.display());
        return Ok(());
    }

    if cli.dump_parsers {
        let introspection = orchestrator::dump_parsers(&config).await?;
        println!("{}", serde_json::to_string_pretty(&introspection)?);
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "sysgrok-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("sysgrok-daemon shut down");
    Ok(())
}
