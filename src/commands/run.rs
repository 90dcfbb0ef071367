use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::sync::watch;

use onair::config::Config;
use onair::metrics;
use onair::orchestrator::setup::build_orchestrator;

/// Run the orchestration loop until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    let mut orchestrator = build_orchestrator(&config).context("Failed to build orchestrator")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_task = match &config.metrics.listen {
        Some(listen) => {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("Invalid metrics listen address: {listen}"))?;
            metrics::init_metrics().map_err(|e| anyhow::anyhow!("Failed to init metrics: {e}"))?;

            let mut rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                let shutdown = async move {
                    let _ = rx.changed().await;
                };
                if let Err(e) = metrics::serve(addr, shutdown).await {
                    tracing::error!(error = %e, %addr, "Metrics server stopped");
                }
            }))
        }
        None => None,
    };

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for Ctrl-C, running until killed");
                // the loop treats a dropped sender as shutdown
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    println!("Orchestrator running");
    println!("====================");
    println!("  Station: {}", config.station.name);
    println!("  Queue: {}", config.paths.queue.display());
    println!("  Signal: {}", config.paths.signal.display());
    println!("  Poll interval: {}s", config.orchestrator.poll_interval_secs);
    if let Some(listen) = &config.metrics.listen {
        println!("  Metrics: http://{listen}/metrics");
    }

    orchestrator
        .run(shutdown_rx)
        .await
        .context("Orchestrator loop failed")?;

    if let Some(task) = metrics_task {
        let _ = task.await;
    }

    println!("Orchestrator stopped");
    Ok(())
}
