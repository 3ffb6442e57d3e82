use anyhow::Result;
use netpoll::*;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    // Duplicate or blank device entries stop startup here, before any polling.
    let registry = Arc::new(registry::DeviceRegistry::load(&app_config.devices)?);
    if registry.is_empty() {
        tracing::warn!("No devices configured; every cycle will be empty");
    }
    tracing::info!(devices = registry.len(), "Device registry loaded");

    let store = Arc::new(store::MetricsStore::new(registry.clone()));
    let (tx, _) = broadcast::channel::<models::CycleReport>(app_config.polling.broadcast_capacity);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let scheduler_handle = scheduler::spawn(
        scheduler::SchedulerDeps {
            registry: registry.clone(),
            store: store.clone(),
            probe: Arc::new(probe::SnmpProbe::new()),
            tx: tx.clone(),
            alert_hook: None,
            shutdown_rx,
        },
        scheduler::SchedulerConfig {
            interval: app_config.polling.interval(),
            probe_timeout: app_config.polling.probe_timeout(),
            stats_log_interval: std::time::Duration::from_secs(
                app_config.polling.stats_log_interval_secs,
            ),
        },
    );

    let app = routes::app(store.clone(), tx);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            scheduler::shutdown(&store, shutdown_tx, scheduler_handle).await;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
