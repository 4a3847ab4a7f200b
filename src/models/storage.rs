// Memory, swap and disk models

use serde::{Deserialize, Serialize};

/// Byte totals plus derived percentage; used for both memory and swap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total: u64,
    pub used: u64,
    #[serde(rename = "usedPercentage")]
    pub used_percentage: f64,
}

impl MemoryMetrics {
    /// Builds totals with the percentage derived from them (0 when total is 0).
    pub fn from_totals(total: u64, used: u64) -> Self {
        let used_percentage = if total > 0 {
            (used as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            total,
            used,
            used_percentage,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    #[serde(rename = "usedPercentage")]
    pub used_percentage: f64,
}

impl DiskMetrics {
    pub fn from_totals(total: u64, free: u64) -> Self {
        let used = total.saturating_sub(free);
        let used_percentage = if total > 0 {
            (used as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            total,
            used,
            free,
            used_percentage,
        }
    }
}
