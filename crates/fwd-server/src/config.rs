use std::time::Duration;

/// Timeouts fixed by the protocol design (§5), not user-configurable.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const BATCH_SEND_TIMEOUT: Duration = Duration::from_secs(30);
pub const BATCH_ACK_TIMEOUT: Duration = Duration::from_secs(30);
pub const WRITER_ENDING_TIMEOUT: Duration = Duration::from_secs(5);
pub const TICK_INTERVAL: Duration = Duration::from_millis(500);
/// How long a connection sleeps before dropping when `random_no_handshake`
/// or `random_no_receiving` fires — long enough that a well-behaved client
/// times out first.
pub const FAULT_SLEEP: Duration = Duration::from_secs(60);
pub const FAULT_NO_RECEIVING_SLEEP: Duration = Duration::from_secs(30);

/// Probabilities for the five fault-injection knobs (§4.5). Each is rolled
/// independently with a uniform `[0, 1)` draw; `r < p` triggers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultConfig {
    pub random_no_handshake: f64,
    pub random_fail_auth: f64,
    pub random_no_receiving: f64,
    pub random_kill_conn: f64,
    pub random_no_response: f64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            random_no_handshake: 0.0,
            random_fail_auth: 0.0,
            random_no_receiving: 0.0,
            random_kill_conn: 0.0,
            random_no_response: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// `None` skips the handshake entirely: the stream begins immediately
    /// with Messages (§6).
    pub shared_secret: Option<String>,
    pub tls: bool,
    pub fault: FaultConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "localhost:24224".to_owned(),
            shared_secret: Some("guess".to_owned()),
            tls: true,
            fault: FaultConfig::default(),
        }
    }
}
