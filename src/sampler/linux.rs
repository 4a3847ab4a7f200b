// Linux-specific helpers: /sys readings, cgroup limits, internal IP.

use crate::models::ContainerMetrics;

/// Read first "model name" from /proc/cpuinfo (Linux).
pub(super) fn read_cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        for line in content.lines() {
            if line.starts_with("model name") {
                let name = line
                    .find(": ")
                    .map(|i| line[i + 2..].trim())
                    .filter(|s| !s.is_empty())?;
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Network interface link speed from /sys/class/net/<interface>/speed,
/// in bits per second, or 0 if unavailable (virtual interfaces report -1).
pub(super) fn interface_speed(interface: &str) -> u64 {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/class/net/{interface}/speed");
        if let Ok(content) = std::fs::read_to_string(&path)
            && let Ok(mbps) = content.trim().parse::<i64>()
            && mbps > 0
        {
            return (mbps as u64) * 1_000_000;
        }
    }
    0
}

/// Operational link state from /sys/class/net/<interface>/operstate.
pub(super) fn interface_operstate(interface: &str) -> String {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/class/net/{interface}/operstate");
        if let Ok(content) = std::fs::read_to_string(&path) {
            let state = content.trim();
            if !state.is_empty() {
                return state.to_string();
            }
        }
    }
    "unknown".into()
}

/// Routable internal address: the local end of a connected UDP socket.
/// No packet is sent; connect() only selects the outbound interface.
pub(super) fn internal_ip() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:53").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}

fn read_trimmed(path: &str) -> Option<String> {
    let v = std::fs::read_to_string(path).ok()?;
    let v = v.trim();
    if v.is_empty() { None } else { Some(v.to_string()) }
}

fn read_u64(path: &str) -> Option<u64> {
    read_trimmed(path)?.parse().ok()
}

/// True when the process runs inside a container (/.dockerenv, or a
/// container runtime named in /proc/1/cgroup).
pub(super) fn container_detected() -> bool {
    if std::path::Path::new("/.dockerenv").exists() {
        return true;
    }
    if let Ok(cgroup) = std::fs::read_to_string("/proc/1/cgroup") {
        return ["docker", "containerd", "kubepods", "lxc"]
            .iter()
            .any(|m| cgroup.contains(m));
    }
    false
}

/// Reads the agent's own cgroup limits: v2 unified hierarchy first
/// (memory.max, memory.current, cpu.max), v1 memory controller as fallback.
pub(super) fn read_container_limits() -> ContainerMetrics {
    let detected = container_detected();

    let memory_limit = read_trimmed("/sys/fs/cgroup/memory.max")
        .filter(|v| v != "max")
        .and_then(|v| v.parse().ok())
        .or_else(|| {
            // v1: the kernel reports "no limit" as a huge page-aligned number
            read_u64("/sys/fs/cgroup/memory/memory.limit_in_bytes").filter(|&v| v < (1 << 60))
        });
    let memory_usage = read_u64("/sys/fs/cgroup/memory.current")
        .or_else(|| read_u64("/sys/fs/cgroup/memory/memory.usage_in_bytes"));

    // cpu.max: "<quota> <period>" or "max <period>"
    let (cpu_quota, cpu_period) = match read_trimmed("/sys/fs/cgroup/cpu.max") {
        Some(v) => {
            let mut parts = v.split_whitespace();
            let quota = parts.next().filter(|q| *q != "max").and_then(|q| q.parse().ok());
            let period = parts.next().and_then(|p| p.parse().ok());
            (quota, period)
        }
        None => (
            read_u64("/sys/fs/cgroup/cpu/cpu.cfs_quota_us").filter(|&q| q > 0),
            read_u64("/sys/fs/cgroup/cpu/cpu.cfs_period_us"),
        ),
    };
    let cpu_limit_cores = match (cpu_quota, cpu_period) {
        (Some(q), Some(p)) if p > 0 => Some(q as f64 / p as f64),
        _ => None,
    };

    ContainerMetrics {
        detected,
        memory_limit,
        memory_usage,
        cpu_quota,
        cpu_period,
        cpu_limit_cores,
    }
}

/// PSI "some avg10" for one resource, from /proc/pressure/<resource>.
pub(super) fn read_psi(resource: &str) -> Option<f64> {
    let content = std::fs::read_to_string(format!("/proc/pressure/{resource}")).ok()?;
    super::proc::parse_psi_some_avg10(&content)
}

/// OS release string: kernel version via /proc, matching `os.release()`
/// on the consumer side.
pub(super) fn kernel_release() -> Option<String> {
    read_trimmed("/proc/sys/kernel/osrelease")
}
