// Outbound WebSocket transport: persistent connection to the consumer with
// independent heartbeat and push timers, reconnect-with-backoff, and an
// explicit connection state machine.

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio::time::{Instant, interval, timeout};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::models::SampleRecord;
use crate::protocol::Envelope;
use crate::sampler::now_ms;

pub const BACKOFF_CAP_MS: u64 = 60_000;
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Reconnect delay for a 1-based attempt number: base doubled per failure,
/// capped at 60s.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    let exp = attempt.saturating_sub(1).min(32);
    base_ms.saturating_mul(1u64 << exp).min(BACKOFF_CAP_MS)
}

/// Two full heartbeat intervals without any inbound frame mark the peer dead.
pub fn idle_deadline_exceeded(
    last_inbound: Instant,
    now: Instant,
    heartbeat_interval: Duration,
) -> bool {
    now.duration_since(last_inbound) >= heartbeat_interval * 2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal: operator shutdown or exhausted reconnect attempts.
    Closed,
}

enum SessionEnd {
    /// Operator-initiated; do not reconnect.
    Shutdown,
    /// Socket lost or peer went silent; reconnect with backoff.
    Lost,
}

/// Record stream and shutdown signal for the transport task.
pub struct TransportDeps {
    pub rx: broadcast::Receiver<SampleRecord>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

pub struct TransportClient {
    url: String,
    host_id: String,
    config: TransportConfig,
    state: ConnectionState,
    attempt: u32,
}

impl TransportClient {
    pub fn new(url: String, host_id: String, config: TransportConfig) -> Self {
        Self {
            url,
            host_id,
            config,
            state: ConnectionState::Disconnected,
            attempt: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Successful open: attempt counter resets.
    pub fn on_connected(&mut self) {
        self.attempt = 0;
        self.state = ConnectionState::Connected;
    }

    /// Failed connect or lost session. Returns the delay before the next
    /// attempt, or None when attempts are exhausted (state goes terminal).
    pub fn on_disconnect(&mut self) -> Option<Duration> {
        self.attempt += 1;
        let max = self.config.max_reconnect_attempts;
        if max >= 0 && i64::from(self.attempt) > max {
            self.state = ConnectionState::Closed;
            return None;
        }
        self.state = ConnectionState::Reconnecting;
        Some(Duration::from_millis(backoff_delay(
            self.config.reconnect_interval_ms,
            self.attempt,
        )))
    }

    pub fn spawn(self, deps: TransportDeps) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(deps))
    }

    async fn run(mut self, mut deps: TransportDeps) {
        loop {
            self.state = ConnectionState::Connecting;
            match connect_async(&self.url).await {
                Ok((ws, _response)) => {
                    self.on_connected();
                    // hostId is logged exactly once per connection lifetime.
                    info!(host_id = %self.host_id, url = %self.url, "connected to consumer");
                    match self.session(ws, &mut deps).await {
                        SessionEnd::Shutdown => {
                            self.state = ConnectionState::Closed;
                            info!("transport closed by operator");
                            return;
                        }
                        SessionEnd::Lost => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, url = %self.url, "connect failed");
                }
            }

            let Some(delay) = self.on_disconnect() else {
                tracing::error!(
                    attempts = self.attempt,
                    "reconnect attempts exhausted; transport stopped"
                );
                return;
            };
            info!(
                attempt = self.attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut deps.shutdown_rx => {
                    self.state = ConnectionState::Closed;
                    return;
                }
            }
        }
    }

    /// One connected session. Heartbeat and push timers are local to the
    /// session, so a reconnect restarts both.
    async fn session(
        &mut self,
        ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
        deps: &mut TransportDeps,
    ) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let heartbeat_interval = Duration::from_millis(self.config.heartbeat_interval_ms);
        let mut heartbeat = interval(heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut push = interval(Duration::from_millis(self.config.push_interval_ms));
        push.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The heartbeat tick fires immediately; skip that one.
        heartbeat.tick().await;

        let mut latest: Option<SampleRecord> = None;
        let mut pushed_initial = false;
        let mut last_inbound = Instant::now();
        let mut session_logged = false;
        let mut ack_logged = false;

        loop {
            tokio::select! {
                result = deps.rx.recv() => match result {
                    Ok(record) => {
                        latest = Some(record);
                        // First push goes out as soon as a record exists.
                        if !pushed_initial {
                            pushed_initial = true;
                            if !self.push_latest(&mut sink, &latest).await {
                                return SessionEnd::Lost;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "transport lagged behind the collector");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Collector is gone; nothing more to send.
                        let _ = close_normal(&mut sink).await;
                        return SessionEnd::Shutdown;
                    }
                },
                _ = push.tick() => {
                    if latest.is_some() {
                        pushed_initial = true;
                        if !self.push_latest(&mut sink, &latest).await {
                            return SessionEnd::Lost;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    if idle_deadline_exceeded(last_inbound, Instant::now(), heartbeat_interval) {
                        warn!("no inbound traffic for two heartbeat intervals; reconnecting");
                        return SessionEnd::Lost;
                    }
                    let ping = Envelope::Ping { timestamp: now_ms() };
                    if !send_envelope(&mut sink, &ping).await {
                        return SessionEnd::Lost;
                    }
                }
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_inbound = Instant::now();
                        match self.dispatch(
                            text.as_str(),
                            &mut sink,
                            &latest,
                            &mut session_logged,
                            &mut ack_logged,
                        ).await {
                            Some(end) => return end,
                            None => {}
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        last_inbound = Instant::now();
                        if timeout(SEND_TIMEOUT, sink.send(Message::Pong(data))).await.is_err() {
                            return SessionEnd::Lost;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_inbound = Instant::now();
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "consumer closed the connection");
                        return SessionEnd::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "socket error");
                        return SessionEnd::Lost;
                    }
                    None => return SessionEnd::Lost,
                },
                _ = &mut deps.shutdown_rx => {
                    let _ = close_normal(&mut sink).await;
                    return SessionEnd::Shutdown;
                }
            }
        }
    }

    /// Inbound message dispatch by envelope type. Malformed or unrecognized
    /// frames are logged and ignored; the connection stays open.
    async fn dispatch(
        &self,
        text: &str,
        sink: &mut WsSink,
        latest: &Option<SampleRecord>,
        session_logged: &mut bool,
        ack_logged: &mut bool,
    ) -> Option<SessionEnd> {
        match serde_json::from_str::<Envelope>(text) {
            Ok(Envelope::Ping { timestamp }) => {
                debug!(timestamp, "ping from consumer");
                let pong = Envelope::Pong { timestamp: now_ms() };
                if !send_envelope(sink, &pong).await {
                    return Some(SessionEnd::Lost);
                }
            }
            Ok(Envelope::GetSystemStats) => {
                if !self.push_latest(sink, latest).await {
                    return Some(SessionEnd::Lost);
                }
            }
            Ok(Envelope::SessionCreated { data }) => {
                if !*session_logged {
                    info!(session_id = %data.session_id, "session created by consumer");
                    *session_logged = true;
                }
            }
            Ok(Envelope::StatsReceived) => {
                if !*ack_logged {
                    debug!("consumer acknowledged stats");
                    *ack_logged = true;
                }
            }
            Ok(other) => {
                debug!(?other, "unexpected envelope from consumer; ignored");
            }
            Err(e) => {
                debug!(error = %e, "malformed message from consumer; ignored");
            }
        }
        None
    }

    /// Sends the latest record as a system_stats envelope. Returns false when
    /// the socket is no longer usable.
    async fn push_latest(&self, sink: &mut WsSink, latest: &Option<SampleRecord>) -> bool {
        let Some(record) = latest else {
            return true;
        };
        let envelope = Envelope::SystemStats {
            host_id: self.host_id.clone(),
            payload: record.clone(),
        };
        send_envelope(sink, &envelope).await
    }
}

async fn send_envelope(sink: &mut WsSink, envelope: &Envelope) -> bool {
    let json = match serde_json::to_string(envelope) {
        Ok(j) => j,
        Err(e) => {
            debug!(error = %e, "envelope serialization failed");
            return true;
        }
    };
    let r = timeout(SEND_TIMEOUT, sink.send(Message::text(json))).await;
    matches!(r, Ok(Ok(())))
}

async fn close_normal(sink: &mut WsSink) -> bool {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "agent shutdown".into(),
    };
    timeout(SEND_TIMEOUT, sink.send(Message::Close(Some(frame))))
        .await
        .is_ok()
}
