// Differential metrics sampler: turns raw monotonic counters into
// rate/percentage metrics across ticks.

mod linux;
pub mod proc;
pub mod reader;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sysinfo::{Disks, System};
use tracing::debug;

use crate::cache::TieredCache;
use crate::models::{
    ContainerMetrics, CpuMetrics, DiskMetrics, IpInfo, LoadAverages, MemoryMetrics,
    NetworkMetrics, OsInfo, PsiMetrics, SampleRecord,
};
use proc::{CpuTimes, MemInfo, NetCounters};
use reader::{DirectProcReader, MetricReader};

/// Sleep between the two /proc/stat reads used for first-tick estimation.
const FIRST_TICK_PROBE: Duration = Duration::from_millis(250);

/// Raw cumulative counters carried between ticks. One per sampler, updated
/// after every differential computation, never shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub cpu_total: u64,
    pub cpu_idle: u64,
    pub net_rx_bytes: u64,
    pub net_tx_bytes: u64,
    pub timestamp_ms: u64,
}

/// Static host identity; refreshed on the slowest cache tier.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub hostname: String,
    pub platform: String,
    pub release: String,
    pub arch: String,
    pub internal_ip: String,
    pub cpu_model: String,
    pub cpu_cores: u32,
}

/// CPU busy percentage between two readings: non-idle share of elapsed
/// jiffies, clamped to 0-100 and rounded. Zero elapsed time reads as idle.
pub fn cpu_usage(prev_total: u64, prev_idle: u64, curr: &CpuTimes) -> f64 {
    let d_total = curr.total().saturating_sub(prev_total);
    if d_total == 0 {
        return 0.0;
    }
    let d_idle = curr.idle_total().saturating_sub(prev_idle).min(d_total);
    (((d_total - d_idle) as f64 / d_total as f64) * 100.0)
        .clamp(0.0, 100.0)
        .round()
}

/// Counter delta that survives 32-bit wraparound. A negative step where the
/// previous value was near the 32-bit boundary (>= 10 decimal digits but
/// still within u32 range) is a rollover; any other negative step is a
/// counter reset. A 64-bit counter past 2^32 cannot roll over here, so a
/// smaller current value after that point is always a reset.
pub fn counter_delta(curr: u64, prev: u64) -> u64 {
    if curr >= prev {
        curr - prev
    } else if (1_000_000_000..=u32::MAX as u64).contains(&prev) {
        (1u64 << 32) - prev + curr
    } else {
        0
    }
}

/// Bytes (or packets) per second from two cumulative readings dt_ms apart.
pub fn rate_per_sec(curr: u64, prev: u64, dt_ms: u64) -> f64 {
    if dt_ms == 0 {
        return 0.0;
    }
    counter_delta(curr, prev) as f64 * 1000.0 / dt_ms as f64
}

/// Milliseconds since the Unix epoch; 0 on a clock before the epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            debug!(error = %e, "system clock before epoch");
            0
        })
}

/// Primary interface: default-route holder, else the first non-loopback
/// interface in /proc/net/dev.
pub fn primary_interface() -> Option<String> {
    if let Ok(content) = std::fs::read_to_string("/proc/net/route")
        && let Some(iface) = proc::parse_default_route_interface(&content)
    {
        return Some(iface);
    }
    let content = std::fs::read_to_string("/proc/net/dev").ok()?;
    NetCounters::interfaces(&content).into_iter().next()
}

/// Owns the counter store and the cache tier; produces one `SampleRecord`
/// per call. A metric source failure zeroes that group and never aborts the
/// tick.
pub struct Sampler {
    reader: Box<dyn MetricReader>,
    prev: Option<CounterSnapshot>,
    cache: TieredCache,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(Box::new(DirectProcReader))
    }
}

impl Sampler {
    pub fn new(reader: Box<dyn MetricReader>) -> Self {
        Self {
            reader,
            prev: None,
            cache: TieredCache::new(),
        }
    }

    pub fn last_snapshot(&self) -> Option<&CounterSnapshot> {
        self.prev.as_ref()
    }

    /// Samples everything for one tick. `interface` is resolved by the caller
    /// at the start of the tick so all network readings agree on it.
    pub fn sample(&mut self, interface: &str) -> SampleRecord {
        let timestamp = now_ms();
        let identity = self.cache.identity.get(read_identity);

        let load = read_load_averages();
        let curr_cpu = match self.reader.cpu_times() {
            Ok(t) => Some(t),
            Err(e) => {
                debug!(error = %e, "cpu counters unavailable");
                None
            }
        };
        let curr_net = match self.reader.net_counters(interface) {
            Ok(c) => Some(c),
            Err(e) => {
                debug!(error = %e, interface, "network counters unavailable");
                None
            }
        };

        let usage = match (&self.prev, &curr_cpu) {
            (Some(prev), Some(curr)) => cpu_usage(prev.cpu_total, prev.cpu_idle, curr),
            (None, _) => self.first_tick_usage(identity.cpu_cores, load.one),
            _ => 0.0,
        };

        let dt_ms = self
            .prev
            .map(|p| timestamp.saturating_sub(p.timestamp_ms))
            .unwrap_or(0);
        let network = match (&self.prev, &curr_net) {
            (Some(prev), Some(curr)) => NetworkMetrics {
                interface: interface.to_string(),
                total_rx_speed: rate_per_sec(curr.rx_bytes, prev.net_rx_bytes, dt_ms),
                total_tx_speed: rate_per_sec(curr.tx_bytes, prev.net_tx_bytes, dt_ms),
                rx_packets: curr.rx_packets,
                tx_packets: curr.tx_packets,
                link_speed: linux::interface_speed(interface),
                link_state: linux::interface_operstate(interface),
            },
            (None, Some(curr)) => NetworkMetrics {
                rx_packets: curr.rx_packets,
                tx_packets: curr.tx_packets,
                link_speed: linux::interface_speed(interface),
                link_state: linux::interface_operstate(interface),
                ..NetworkMetrics::idle(interface)
            },
            _ => NetworkMetrics::idle(interface),
        };

        let (memory, swap) = read_memory();
        let disk = self.cache.disk.get(read_disk_usage);
        let psi = self.cache.psi.get(read_psi_metrics);
        let container = self.cache.container.get(read_container_metrics);

        // Seed/advance the counter store; groups that failed to read carry
        // the previous raw values forward so the next delta stays sane.
        let prev = self.prev;
        self.prev = Some(CounterSnapshot {
            cpu_total: curr_cpu
                .as_ref()
                .map(CpuTimes::total)
                .or(prev.map(|p| p.cpu_total))
                .unwrap_or(0),
            cpu_idle: curr_cpu
                .as_ref()
                .map(CpuTimes::idle_total)
                .or(prev.map(|p| p.cpu_idle))
                .unwrap_or(0),
            net_rx_bytes: curr_net
                .map(|c| c.rx_bytes)
                .or(prev.map(|p| p.net_rx_bytes))
                .unwrap_or(0),
            net_tx_bytes: curr_net
                .map(|c| c.tx_bytes)
                .or(prev.map(|p| p.net_tx_bytes))
                .unwrap_or(0),
            timestamp_ms: timestamp,
        });

        SampleRecord {
            timestamp,
            cpu: CpuMetrics {
                usage,
                cores: identity.cpu_cores,
                model: identity.cpu_model.clone(),
                load_average: load,
            },
            memory,
            swap,
            disk,
            network,
            os: OsInfo {
                hostname: identity.hostname.clone(),
                platform: identity.platform.clone(),
                release: identity.release.clone(),
                arch: identity.arch.clone(),
                uptime: read_uptime_secs(),
            },
            ip: IpInfo {
                internal: identity.internal_ip,
            },
            psi,
            container,
        }
    }

    /// First tick has no prior snapshot. In order: one-shot shell estimator
    /// (only the shell reader has one), double-read of the raw counters
    /// across a short fixed sleep, load-average estimate capped at 100.
    fn first_tick_usage(&self, cores: u32, load1: f64) -> f64 {
        if let Some(u) = self.reader.cpu_usage_oneshot() {
            return u.round();
        }
        if let Ok(first) = self.reader.cpu_times() {
            std::thread::sleep(FIRST_TICK_PROBE);
            if let Ok(second) = self.reader.cpu_times() {
                return cpu_usage(first.total(), first.idle_total(), &second);
            }
        }
        let cores = cores.max(1) as f64;
        (load1 / cores * 100.0).clamp(0.0, 100.0).round()
    }
}

fn read_load_averages() -> LoadAverages {
    let parsed = std::fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|c| proc::parse_loadavg(&c).ok());
    match parsed {
        Some((one, five, fifteen)) => LoadAverages { one, five, fifteen },
        None => {
            debug!("loadavg unavailable");
            LoadAverages {
                one: 0.0,
                five: 0.0,
                fifteen: 0.0,
            }
        }
    }
}

fn read_memory() -> (MemoryMetrics, MemoryMetrics) {
    let info = match std::fs::read_to_string("/proc/meminfo") {
        Ok(c) => MemInfo::parse(&c),
        Err(e) => {
            debug!(error = %e, "meminfo unavailable");
            MemInfo::default()
        }
    };
    let memory = MemoryMetrics::from_totals(
        info.mem_total,
        info.mem_total.saturating_sub(info.mem_available),
    );
    let swap = MemoryMetrics::from_totals(
        info.swap_total,
        info.swap_total.saturating_sub(info.swap_free),
    );
    (memory, swap)
}

/// Root filesystem usage via a fresh disk scan (cached by the caller's tier).
fn read_disk_usage() -> DiskMetrics {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"))
        .or_else(|| disks.list().first());
    match root {
        Some(d) => DiskMetrics::from_totals(d.total_space(), d.available_space()),
        None => {
            debug!("no disks reported");
            DiskMetrics::from_totals(0, 0)
        }
    }
}

fn read_psi_metrics() -> Option<PsiMetrics> {
    Some(PsiMetrics {
        cpu: linux::read_psi("cpu")?,
        memory: linux::read_psi("memory").unwrap_or(0.0),
        io: linux::read_psi("io").unwrap_or(0.0),
    })
}

fn read_container_metrics() -> Option<ContainerMetrics> {
    let limits = linux::read_container_limits();
    limits.detected.then_some(limits)
}

fn read_uptime_secs() -> u64 {
    std::fs::read_to_string("/proc/uptime")
        .ok()
        .and_then(|c| proc::parse_uptime_secs(&c))
        .unwrap_or_else(System::uptime)
}

fn read_identity() -> HostIdentity {
    HostIdentity {
        hostname: System::host_name().unwrap_or_else(|| "unknown".into()),
        platform: std::env::consts::OS.to_string(),
        release: linux::kernel_release()
            .or_else(System::kernel_version)
            .unwrap_or_default(),
        arch: std::env::consts::ARCH.to_string(),
        internal_ip: linux::internal_ip().unwrap_or_else(|| "127.0.0.1".into()),
        cpu_model: linux::read_cpu_model().unwrap_or_else(|| "Unknown".into()),
        cpu_cores: std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1),
    }
}
