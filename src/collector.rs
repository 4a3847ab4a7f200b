// Sampling loop: the tick driver. Owns the Sampler (counter store + cache)
// exclusively; fans records out on a broadcast channel for whichever
// transport is active, or prints NDJSON when standalone.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tokio::time::{Duration, Instant, interval};
use tracing::debug;

use crate::models::SampleRecord;
use crate::sampler::{Sampler, primary_interface};

/// Rate limit for the "no receivers" log (avoid a line every tick while the
/// transport is reconnecting).
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Channel, shutdown and counters for the collector.
pub struct CollectorDeps {
    pub sampler: Sampler,
    pub tx: broadcast::Sender<SampleRecord>,
    pub records_published: Arc<AtomicU64>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

pub struct CollectorConfig {
    pub sample_interval_ms: u64,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
    /// Standalone mode: emit each record as one NDJSON line on stdout.
    pub ndjson: bool,
}

pub fn spawn(deps: CollectorDeps, config: CollectorConfig) -> tokio::task::JoinHandle<()> {
    let CollectorDeps {
        mut sampler,
        tx,
        records_published,
        mut shutdown_rx,
    } = deps;
    let CollectorConfig {
        sample_interval_ms,
        stats_log_interval_secs,
        ndjson,
    } = config;

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_millis(sample_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut last_no_receivers_log: Option<Instant> = None;
        let mut fallback_interface_logged = false;

        let span = tracing::span!(tracing::Level::DEBUG, "collector", sample_interval_ms);
        let _guard = span.enter();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    // Resolve the primary interface at the start of every tick;
                    // the default route can move between ticks.
                    let interface = match primary_interface() {
                        Some(i) => i,
                        None => {
                            if !fallback_interface_logged {
                                debug!("no usable network interface; network metrics will be zero");
                                fallback_interface_logged = true;
                            }
                            "lo".into()
                        }
                    };

                    let record = sampler.sample(&interface);

                    if ndjson {
                        match serde_json::to_string(&record) {
                            Ok(line) => println!("{line}"),
                            Err(e) => debug!(error = %e, "record serialization failed"),
                        }
                        records_published.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }

                    if tx.send(record).is_err() {
                        let should_log = last_no_receivers_log
                            .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
                        if should_log {
                            debug!("no transport attached; record dropped");
                            last_no_receivers_log = Some(Instant::now());
                        }
                    } else {
                        records_published.fetch_add(1, Ordering::Relaxed);
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!("Collector shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        records_published = records_published.load(Ordering::Relaxed),
                        "app stats"
                    );
                }
            }
        }
    })
}
