use anyhow::Result;
use hostpulse::*;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

use collector::{CollectorConfig, CollectorDeps};
use config::AgentMode;
use transport::{TransportClient, TransportDeps};

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

/// Lower scheduling priority so sampling never competes with host workloads.
fn lower_priority() {
    #[cfg(unix)]
    {
        let r = unsafe { libc::nice(10) };
        if r == -1 {
            tracing::debug!("could not lower scheduling priority");
        }
    }
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

// Single-threaded runtime: the counter store and cache are owned by one event
// loop, no shared-memory concurrency anywhere.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // stdout is reserved for NDJSON output
        .init();

    let app_config = config::AppConfig::load()?;
    lower_priority();

    let (tx, _) = broadcast::channel::<models::SampleRecord>(64);

    // Seed the counter store and learn host identity before the loop starts;
    // the first-tick CPU estimation happens here, once.
    let mut sampler = sampler::Sampler::default();
    let interface = sampler::primary_interface().unwrap_or_else(|| "lo".into());
    let first = sampler.sample(&interface);
    let host_id = protocol::host_id(&first.os.hostname, &first.ip.internal);

    let records_published = Arc::new(AtomicU64::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let collector_handle = collector::spawn(
        CollectorDeps {
            sampler,
            tx: tx.clone(),
            records_published: records_published.clone(),
            shutdown_rx,
        },
        CollectorConfig {
            sample_interval_ms: app_config.agent.sample_interval_ms,
            stats_log_interval_secs: app_config.agent.stats_log_interval_secs,
            ndjson: app_config.agent.mode == AgentMode::Stdout,
        },
    );

    match app_config.agent.mode {
        AgentMode::Client => {
            let client = TransportClient::new(
                app_config.consumer.ws_url(),
                host_id,
                app_config.transport.clone(),
            );
            let (transport_shutdown_tx, transport_shutdown_rx) = tokio::sync::oneshot::channel();
            let transport_handle = client.spawn(TransportDeps {
                rx: tx.subscribe(),
                shutdown_rx: transport_shutdown_rx,
            });

            shutdown_signal().await;
            tracing::info!("Received shutdown signal");
            let _ = transport_shutdown_tx.send(());
            let _ = shutdown_tx.send(());
            let _ = transport_handle.await;
            let _ = collector_handle.await;
        }
        AgentMode::Server => {
            let listen = app_config
                .listen
                .clone()
                .ok_or_else(|| anyhow::anyhow!("[listen] section required in server mode"))?;
            let app = routes::app(tx.clone(), host_id, listen.allowed_ip);
            let addr = format!("{}:{}", listen.host, listen.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);

            tokio::select! {
                result = axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                ) => {
                    result?;
                }
                _ = shutdown_signal() => {
                    tracing::info!("Received shutdown signal");
                    let _ = shutdown_tx.send(());
                    let _ = collector_handle.await;
                }
            }
        }
        AgentMode::Stdout => {
            shutdown_signal().await;
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = collector_handle.await;
        }
    }

    Ok(())
}
