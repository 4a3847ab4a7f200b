// End-to-end sampling loop: one spawned collector, one broadcast subscriber.

#![cfg(target_os = "linux")]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hostpulse::collector::{self, CollectorConfig, CollectorDeps};
use hostpulse::models::SampleRecord;
use hostpulse::sampler::Sampler;
use tokio::sync::broadcast;

#[tokio::test]
async fn test_collector_publishes_records() {
    let (tx, mut rx) = broadcast::channel::<SampleRecord>(8);
    let records_published = Arc::new(AtomicU64::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let handle = collector::spawn(
        CollectorDeps {
            sampler: Sampler::default(),
            tx,
            records_published: records_published.clone(),
            shutdown_rx,
        },
        CollectorConfig {
            sample_interval_ms: 100,
            stats_log_interval_secs: 60,
            ndjson: false,
        },
    );

    let record = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("a record within the deadline")
        .expect("channel open");
    assert!((0.0..=100.0).contains(&record.cpu.usage));
    assert!(record.timestamp > 0);

    shutdown_tx.send(()).expect("collector alive");
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("collector exits on shutdown")
        .expect("task not panicked");
    assert!(records_published.load(Ordering::Relaxed) >= 1);
}
