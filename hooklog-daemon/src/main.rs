use anyhow::Result;
use clap::Parser;

use hooklog_daemon::cli::DaemonCli;
use hooklog_daemon::logging;
use hooklog_daemon::orchestrator::{Orchestrator, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = load_config(&cli.config).await?;
    cli.apply_overrides(&mut config);

    if cli.validate {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "hooklog-daemon starting"
    );

    let mut orchestrator =
        Orchestrator::build_from_config(config)?.with_sample_injection(cli.inject_samples);
    orchestrator.run().await?;

    tracing::info!("hooklog-daemon shut down");
    Ok(())
}
