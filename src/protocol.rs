// JSON text frames exchanged with the consumer. One envelope per frame,
// dispatched on the "type" tag; unrecognized types are logged and ignored
// without closing the connection.

use serde::{Deserialize, Serialize};

use crate::models::SampleRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    SystemStats {
        #[serde(rename = "hostId")]
        host_id: String,
        payload: SampleRecord,
    },
    Ping {
        timestamp: u64,
    },
    Pong {
        timestamp: u64,
    },
    /// Consumer-initiated request for an immediate out-of-cycle push.
    GetSystemStats,
    /// Informational ack from the consumer.
    StatsReceived,
    SessionCreated {
        data: SessionData,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Identifier distinguishing hosts reporting to the same consumer.
pub fn host_id(hostname: &str, internal_ip: &str) -> String {
    format!("{hostname}@{internal_ip}")
}
