use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    pub listen: Option<ListenConfig>,
}

/// How the agent delivers records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Dial out to the consumer over WebSocket (default deployment).
    Client,
    /// Accept one inbound consumer connection, guarded by source IP.
    Server,
    /// Standalone: one NDJSON record per tick on stdout.
    Stdout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub mode: AgentMode,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// How often to log the records-published counter at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

/// The remote consumer the client mode dials.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_ws_protocol")]
    pub ws_protocol: String,
}

impl ConsumerConfig {
    pub fn ws_url(&self) -> String {
        format!("{}://{}:{}", self.ws_protocol, self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base reconnect delay; doubles per attempt, capped at 60s.
    pub reconnect_interval_ms: u64,
    /// -1 = retry forever.
    pub max_reconnect_attempts: i64,
    pub heartbeat_interval_ms: u64,
    pub push_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: 5_000,
            max_reconnect_attempts: -1,
            heartbeat_interval_ms: 30_000,
            push_interval_ms: 3_000,
        }
    }
}

/// Inbound (server) mode: where to listen and the one consumer allowed in.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
    /// The single source IP authorized to connect to /ws.
    pub allowed_ip: std::net::IpAddr,
}

fn default_sample_interval_ms() -> u64 {
    1_000
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

fn default_ws_protocol() -> String {
    "ws".into()
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.agent.sample_interval_ms > 0,
            "agent.sample_interval_ms must be > 0, got {}",
            self.agent.sample_interval_ms
        );
        anyhow::ensure!(
            self.agent.stats_log_interval_secs > 0,
            "agent.stats_log_interval_secs must be > 0, got {}",
            self.agent.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.consumer.port > 0,
            "consumer.port must be between 1 and 65535, got {}",
            self.consumer.port
        );
        anyhow::ensure!(
            !self.consumer.host.is_empty(),
            "consumer.host must be non-empty"
        );
        anyhow::ensure!(
            matches!(self.consumer.ws_protocol.as_str(), "ws" | "wss"),
            "consumer.ws_protocol must be \"ws\" or \"wss\", got {:?}",
            self.consumer.ws_protocol
        );
        anyhow::ensure!(
            self.transport.reconnect_interval_ms > 0,
            "transport.reconnect_interval_ms must be > 0, got {}",
            self.transport.reconnect_interval_ms
        );
        anyhow::ensure!(
            self.transport.max_reconnect_attempts >= -1,
            "transport.max_reconnect_attempts must be >= -1, got {}",
            self.transport.max_reconnect_attempts
        );
        anyhow::ensure!(
            self.transport.heartbeat_interval_ms > 0,
            "transport.heartbeat_interval_ms must be > 0, got {}",
            self.transport.heartbeat_interval_ms
        );
        anyhow::ensure!(
            self.transport.push_interval_ms > 0,
            "transport.push_interval_ms must be > 0, got {}",
            self.transport.push_interval_ms
        );
        if self.agent.mode == AgentMode::Server {
            let listen = self
                .listen
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("[listen] section required in server mode"))?;
            anyhow::ensure!(
                listen.port > 0,
                "listen.port must be between 1 and 65535, got {}",
                listen.port
            );
            anyhow::ensure!(!listen.host.is_empty(), "listen.host must be non-empty");
        }
        Ok(())
    }
}
