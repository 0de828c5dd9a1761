use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use pipeline_relay::cli::Cli;
use pipeline_relay::output;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if !cli.quiet() {
        output::print_banner();
    }

    info!("Starting pipeline-relay");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            on_interrupt.cancel();
        }
    });

    cli.execute(cancel).await?;

    Ok(())
}
