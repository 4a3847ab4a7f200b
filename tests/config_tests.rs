// Config loading and validation tests

use hostpulse::config::{AgentMode, AppConfig};

const VALID_CONFIG: &str = r#"
[agent]
mode = "client"
sample_interval_ms = 1000
stats_log_interval_secs = 60

[consumer]
protocol = "http"
host = "192.168.1.20"
port = 8080
ws_protocol = "ws"

[transport]
reconnect_interval_ms = 5000
max_reconnect_attempts = -1
heartbeat_interval_ms = 30000
push_interval_ms = 3000
"#;

const VALID_SERVER_CONFIG: &str = r#"
[agent]
mode = "server"

[consumer]
protocol = "http"
host = "192.168.1.20"
port = 8080

[listen]
host = "0.0.0.0"
port = 9100
allowed_ip = "192.168.1.20"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.agent.mode, AgentMode::Client);
    assert_eq!(config.agent.sample_interval_ms, 1000);
    assert_eq!(config.consumer.host, "192.168.1.20");
    assert_eq!(config.consumer.port, 8080);
    assert_eq!(config.transport.reconnect_interval_ms, 5000);
    assert_eq!(config.transport.max_reconnect_attempts, -1);
}

#[test]
fn test_config_ws_url() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("valid");
    assert_eq!(config.consumer.ws_url(), "ws://192.168.1.20:8080");
}

#[test]
fn test_config_transport_defaults_when_omitted() {
    let no_transport = VALID_CONFIG
        .lines()
        .take_while(|l| !l.starts_with("[transport]"))
        .collect::<Vec<_>>()
        .join("\n");
    let config = AppConfig::load_from_str(&no_transport).expect("valid");
    assert_eq!(config.transport.reconnect_interval_ms, 5000);
    assert_eq!(config.transport.max_reconnect_attempts, -1);
    assert_eq!(config.transport.heartbeat_interval_ms, 30000);
    assert_eq!(config.transport.push_interval_ms, 3000);
}

#[test]
fn test_config_agent_defaults() {
    let minimal = r#"
[agent]
mode = "stdout"

[consumer]
protocol = "http"
host = "h"
port = 1
"#;
    let config = AppConfig::load_from_str(minimal).expect("valid");
    assert_eq!(config.agent.mode, AgentMode::Stdout);
    assert_eq!(config.agent.sample_interval_ms, 1000);
    assert_eq!(config.consumer.ws_protocol, "ws");
}

#[test]
fn test_config_validation_rejects_sample_interval_zero() {
    let bad = VALID_CONFIG.replace("sample_interval_ms = 1000", "sample_interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sample_interval_ms"));
}

#[test]
fn test_config_validation_rejects_stats_log_interval_zero() {
    let bad = VALID_CONFIG.replace(
        "stats_log_interval_secs = 60",
        "stats_log_interval_secs = 0",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("stats_log_interval_secs"));
}

#[test]
fn test_config_validation_rejects_empty_consumer_host() {
    let bad = VALID_CONFIG.replace("host = \"192.168.1.20\"", "host = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("consumer.host"));
}

#[test]
fn test_config_validation_rejects_bad_ws_protocol() {
    let bad = VALID_CONFIG.replace("ws_protocol = \"ws\"", "ws_protocol = \"http\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("ws_protocol"));
}

#[test]
fn test_config_validation_rejects_reconnect_interval_zero() {
    let bad = VALID_CONFIG.replace("reconnect_interval_ms = 5000", "reconnect_interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("reconnect_interval_ms"));
}

#[test]
fn test_config_validation_rejects_max_attempts_below_minus_one() {
    let bad = VALID_CONFIG.replace(
        "max_reconnect_attempts = -1",
        "max_reconnect_attempts = -2",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("max_reconnect_attempts"));
}

#[test]
fn test_config_validation_rejects_heartbeat_interval_zero() {
    let bad = VALID_CONFIG.replace("heartbeat_interval_ms = 30000", "heartbeat_interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("heartbeat_interval_ms"));
}

#[test]
fn test_config_validation_rejects_push_interval_zero() {
    let bad = VALID_CONFIG.replace("push_interval_ms = 3000", "push_interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("push_interval_ms"));
}

#[test]
fn test_config_server_mode_loads_with_listen() {
    let config = AppConfig::load_from_str(VALID_SERVER_CONFIG).expect("valid");
    assert_eq!(config.agent.mode, AgentMode::Server);
    let listen = config.listen.expect("listen section");
    assert_eq!(listen.port, 9100);
    assert_eq!(listen.allowed_ip, "192.168.1.20".parse::<std::net::IpAddr>().unwrap());
}

#[test]
fn test_config_server_mode_requires_listen() {
    let bad = VALID_CONFIG.replace("mode = \"client\"", "mode = \"server\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("[listen]"));
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.consumer.port, 8080);
    assert_eq!(config.agent.mode, AgentMode::Client);
}
