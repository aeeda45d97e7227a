//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::ServerSettings;
use tracing::{info, warn};

use super::load_settings;
use crate::cli::RunArgs;
use crate::pipeline::{Server, ServerConfig};

/// Execute the `run` command
pub async fn run_server(args: &RunArgs) -> Result<()> {
    let settings = load_settings(&args.config).context("Failed to load configuration")?;

    info!(
        input = %settings.input.describe(),
        mode = settings.mode.as_str(),
        blocks = settings.blocks.len(),
        high_water_mark = settings.high_water_mark,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_settings_summary(&settings);
        return Ok(());
    }

    let server = Server::new(ServerConfig {
        settings,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    info!("Starting server...");
    let stats = server
        .run(shutdown_signal())
        .await
        .context("Server execution failed")?;

    stats.print_summary();

    if !stats.outcome.is_clean() {
        anyhow::bail!("Server stopped abnormally: {:?}", stats.outcome);
    }

    info!("TS Sampler finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, stopping server..."),
        _ = terminate => warn!("Received SIGTERM, stopping server..."),
    }
}

/// Print settings summary for dry-run mode
fn print_settings_summary(settings: &ServerSettings) {
    println!("\n=== Configuration Summary ===\n");
    println!("Input: {}", settings.input.describe());
    println!("Mode: {}", settings.mode.as_str());
    println!("High water mark: {}", settings.high_water_mark);
    match settings.max_timeslices {
        Some(max) => println!("Max timeslices: {max}"),
        None => println!("Max timeslices: unbounded"),
    }

    if !settings.blocks.is_empty() {
        println!("\nBlocks ({}):", settings.blocks.len());
        for block in &settings.blocks {
            println!("  - {} {:?}", block.name, block.systems);
        }
    }

    let channels = &settings.channels;
    println!("\nChannels:");
    println!(
        "  Request: {} ({})",
        channels.request.name, channels.request.address
    );
    for (role, binding) in [
        ("Missed indices", &channels.missed_indices),
        ("Commands", &channels.commands),
        ("Metrics", &channels.metrics),
    ] {
        match binding {
            Some(b) => println!("  {role}: {} ({:?} {})", b.name, b.kind, b.address),
            None => println!("  {role}: disabled"),
        }
    }

    println!();
}
