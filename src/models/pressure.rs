// PSI pressure and cgroup container limit models

use serde::{Deserialize, Serialize};

/// PSI "some avg10" percentages per resource (kernel 4.20+, absent otherwise).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PsiMetrics {
    pub cpu: f64,
    pub memory: f64,
    pub io: f64,
}

/// Limits read from the agent's own cgroup when it runs inside a container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub detected: bool,
    pub memory_limit: Option<u64>,
    pub memory_usage: Option<u64>,
    pub cpu_quota: Option<u64>,
    pub cpu_period: Option<u64>,
    pub cpu_limit_cores: Option<f64>,
}
