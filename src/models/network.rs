// Primary-interface network metrics

use serde::{Deserialize, Serialize};

/// Rates are bytes/sec over the last tick; `link_speed` is bits/sec from
/// /sys/class/net, 0 when the kernel does not report one (virtual interfaces).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub interface: String,
    pub total_rx_speed: f64,
    pub total_tx_speed: f64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub link_speed: u64,
    pub link_state: String,
}

impl NetworkMetrics {
    pub fn idle(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            total_rx_speed: 0.0,
            total_tx_speed: 0.0,
            rx_packets: 0,
            tx_packets: 0,
            link_speed: 0,
            link_state: "unknown".into(),
        }
    }
}
