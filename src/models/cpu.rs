// CPU usage and load average models

use serde::{Deserialize, Serialize};

/// 1/5/15-minute load averages; wire keys are the literal window lengths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadAverages {
    #[serde(rename = "1")]
    pub one: f64,
    #[serde(rename = "5")]
    pub five: f64,
    #[serde(rename = "15")]
    pub fifteen: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuMetrics {
    /// Busy percentage over the last tick, rounded to the nearest integer, 0-100.
    pub usage: f64,
    pub cores: u32,
    pub model: String,
    #[serde(rename = "loadAverage")]
    pub load_average: LoadAverages,
}
