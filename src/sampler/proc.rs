// Pure parsers for /proc text formats. Reading is done by the MetricReader
// implementations; everything here takes a string so tests can feed synthetic
// input.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcParseError {
    #[error("no aggregate cpu line in /proc/stat")]
    MissingCpuLine,
    #[error("interface {0} not found in /proc/net/dev")]
    MissingInterface(String),
    #[error("malformed {file}: {detail}")]
    Malformed { file: &'static str, detail: String },
}

/// Cumulative CPU jiffies from the aggregate `cpu ` line of /proc/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuTimes {
    pub fn parse(content: &str) -> Result<Self, ProcParseError> {
        let line = content
            .lines()
            .find(|l| l.starts_with("cpu "))
            .ok_or(ProcParseError::MissingCpuLine)?;
        let field = |idx: usize| -> u64 {
            line.split_whitespace()
                .nth(idx)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0)
        };
        Ok(Self {
            user: field(1),
            nice: field(2),
            system: field(3),
            idle: field(4),
            iowait: field(5),
            irq: field(6),
            softirq: field(7),
            steal: field(8),
            guest: field(9),
            guest_nice: field(10),
        })
    }

    /// Total jiffies. Guest time is excluded: on kernels that account guest
    /// time it is already folded into user/nice, and adding it again
    /// double-counts.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Cumulative byte/packet counters for one interface from /proc/net/dev.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

impl NetCounters {
    /// Line format after the two header lines:
    /// `iface: rx_bytes rx_packets ... (8 rx cols) tx_bytes tx_packets ...`
    pub fn parse(content: &str, interface: &str) -> Result<Self, ProcParseError> {
        for line in content.lines().skip(2) {
            let Some((name, rest)) = line.split_once(':') else {
                continue;
            };
            if name.trim() != interface {
                continue;
            }
            let cols: Vec<u64> = rest
                .split_whitespace()
                .map(|s| s.parse().unwrap_or(0))
                .collect();
            if cols.len() < 10 {
                return Err(ProcParseError::Malformed {
                    file: "/proc/net/dev",
                    detail: format!("{} columns for {}", cols.len(), interface),
                });
            }
            return Ok(Self {
                rx_bytes: cols[0],
                rx_packets: cols[1],
                tx_bytes: cols[8],
                tx_packets: cols[9],
            });
        }
        Err(ProcParseError::MissingInterface(interface.to_string()))
    }

    /// Interface names in file order, loopback excluded.
    pub fn interfaces(content: &str) -> Vec<String> {
        content
            .lines()
            .skip(2)
            .filter_map(|l| l.split_once(':').map(|(n, _)| n.trim().to_string()))
            .filter(|n| n != "lo")
            .collect()
    }
}

/// 1/5/15-minute load averages from /proc/loadavg.
pub fn parse_loadavg(content: &str) -> Result<(f64, f64, f64), ProcParseError> {
    let mut it = content.split_whitespace();
    let mut next = || -> Result<f64, ProcParseError> {
        it.next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ProcParseError::Malformed {
                file: "/proc/loadavg",
                detail: content.trim().to_string(),
            })
    };
    Ok((next()?, next()?, next()?))
}

/// Memory and swap totals from /proc/meminfo, in bytes.
/// Used memory is MemTotal - MemAvailable (kernel's own reclaimable estimate).
#[derive(Debug, Clone, Copy, Default)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_available: u64,
    pub swap_total: u64,
    pub swap_free: u64,
}

impl MemInfo {
    pub fn parse(content: &str) -> Self {
        let mut info = Self::default();
        for line in content.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let kb: u64 = rest
                .trim()
                .trim_end_matches(" kB")
                .trim()
                .parse()
                .unwrap_or(0);
            match key {
                "MemTotal" => info.mem_total = kb * 1024,
                "MemAvailable" => info.mem_available = kb * 1024,
                "SwapTotal" => info.swap_total = kb * 1024,
                "SwapFree" => info.swap_free = kb * 1024,
                _ => {}
            }
        }
        info
    }
}

/// "some avg10" percentage from a /proc/pressure/{cpu,memory,io} file.
pub fn parse_psi_some_avg10(content: &str) -> Option<f64> {
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("some") {
            continue;
        }
        for part in parts {
            if let Some(v) = part.strip_prefix("avg10=") {
                return v.parse().ok().map(|p: f64| p.clamp(0.0, 100.0));
            }
        }
    }
    None
}

/// Interface carrying the default route, from /proc/net/route
/// (destination column all-zeroes).
pub fn parse_default_route_interface(content: &str) -> Option<String> {
    for line in content.lines().skip(1) {
        let mut cols = line.split_whitespace();
        let iface = cols.next()?;
        let dest = cols.next()?;
        if dest == "00000000" {
            return Some(iface.to_string());
        }
    }
    None
}

/// Uptime seconds from /proc/uptime.
pub fn parse_uptime_secs(content: &str) -> Option<u64> {
    content
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<f64>().ok())
        .map(|s| s as u64)
}
