// OS identity and the per-tick sample record

use serde::{Deserialize, Serialize};

use super::{ContainerMetrics, CpuMetrics, DiskMetrics, MemoryMetrics, NetworkMetrics, PsiMetrics};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsInfo {
    pub hostname: String,
    pub platform: String,
    pub release: String,
    pub arch: String,
    /// Seconds since boot.
    pub uptime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpInfo {
    pub internal: String,
}

/// One immutable record per tick. All sub-metrics are computed from the same
/// counter snapshot; percentages are 0-100 and rates are >= 0 by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub swap: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
    pub os: OsInfo,
    pub ip: IpInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psi: Option<PsiMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerMetrics>,
}
