// Raw counter sources. Direct /proc parsing is the default; the shell variant
// exists for stripped-down hosts where /proc/stat or /proc/net/dev reads are
// restricted but vmstat and /sys are still reachable.

use std::process::Command;

use super::proc::{CpuTimes, NetCounters};

pub trait MetricReader: Send {
    fn cpu_times(&self) -> anyhow::Result<CpuTimes>;
    fn net_counters(&self, interface: &str) -> anyhow::Result<NetCounters>;
    /// One-shot CPU usage estimate for the very first tick, before any
    /// snapshot exists. Only the shell reader can produce one.
    fn cpu_usage_oneshot(&self) -> Option<f64> {
        None
    }
}

/// Parses /proc/stat and /proc/net/dev directly.
#[derive(Debug, Default)]
pub struct DirectProcReader;

impl MetricReader for DirectProcReader {
    fn cpu_times(&self) -> anyhow::Result<CpuTimes> {
        let content = std::fs::read_to_string("/proc/stat")?;
        Ok(CpuTimes::parse(&content)?)
    }

    fn net_counters(&self, interface: &str) -> anyhow::Result<NetCounters> {
        let content = std::fs::read_to_string("/proc/net/dev")?;
        Ok(NetCounters::parse(&content, interface)?)
    }
}

/// Last-resort reader that shells out: `vmstat -s` for cumulative CPU ticks,
/// /sys/class/net statistics files for interface counters.
#[derive(Debug, Default)]
pub struct ShellFallbackReader;

impl ShellFallbackReader {
    fn read_stat_file(path: &str) -> u64 {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}

impl MetricReader for ShellFallbackReader {
    fn cpu_times(&self) -> anyhow::Result<CpuTimes> {
        let output = Command::new("vmstat").arg("-s").output()?;
        anyhow::ensure!(output.status.success(), "vmstat -s exited non-zero");
        Ok(parse_vmstat_ticks(&String::from_utf8_lossy(&output.stdout)))
    }

    fn net_counters(&self, interface: &str) -> anyhow::Result<NetCounters> {
        let stat = |name: &str| {
            Self::read_stat_file(&format!("/sys/class/net/{interface}/statistics/{name}"))
        };
        Ok(NetCounters {
            rx_bytes: stat("rx_bytes"),
            tx_bytes: stat("tx_bytes"),
            rx_packets: stat("rx_packets"),
            tx_packets: stat("tx_packets"),
        })
    }

    fn cpu_usage_oneshot(&self) -> Option<f64> {
        // `vmstat 1 2`: the second sample line reflects actual utilization
        // over one second; column 15 is idle%.
        let output = Command::new("vmstat").args(["1", "2"]).output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_vmstat_oneshot(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Maps `vmstat -s` cumulative tick lines onto CpuTimes fields. Unlisted
/// fields (guest) stay zero.
pub fn parse_vmstat_ticks(output: &str) -> CpuTimes {
    let mut times = CpuTimes::default();
    for line in output.lines() {
        let line = line.trim();
        let Some((value, label)) = line.split_once(' ') else {
            continue;
        };
        let Ok(v) = value.parse::<u64>() else {
            continue;
        };
        match label.trim() {
            "non-nice user cpu ticks" => times.user = v,
            "nice user cpu ticks" => times.nice = v,
            "system cpu ticks" => times.system = v,
            "idle cpu ticks" => times.idle = v,
            "IO-wait cpu ticks" => times.iowait = v,
            "IRQ cpu ticks" => times.irq = v,
            "softirq cpu ticks" => times.softirq = v,
            "stolen cpu ticks" => times.steal = v,
            _ => {}
        }
    }
    times
}

/// Extracts usage% (100 - idle) from the last sample row of `vmstat 1 2`.
pub fn parse_vmstat_oneshot(output: &str) -> Option<f64> {
    let last = output
        .lines()
        .filter(|l| {
            l.split_whitespace()
                .next()
                .is_some_and(|c| c.parse::<i64>().is_ok())
        })
        .next_back()?;
    let cols: Vec<&str> = last.split_whitespace().collect();
    let idle: f64 = cols.get(14)?.parse().ok()?;
    Some((100.0 - idle).clamp(0.0, 100.0))
}
