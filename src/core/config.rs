//! Client, relay and link configuration.
//!
//! Everything has a working default; environment variables override
//! individual fields.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::{NetError, Result};

/// Server address a client dials.
pub const ENV_SERVER_ADDR: &str = "LANPONG_SERVER_ADDR";
/// Address the relay listens on.
pub const ENV_BIND_ADDR: &str = "LANPONG_BIND_ADDR";
/// Connect timeout in milliseconds.
pub const ENV_CONNECT_TIMEOUT_MS: &str = "LANPONG_CONNECT_TIMEOUT_MS";
/// Tick period in milliseconds.
pub const ENV_TICK_MS: &str = "LANPONG_TICK_MS";
/// Client Waiting-to-Playing trigger: `scheduled`, `signal` or `connected`.
pub const ENV_START_TRIGGER: &str = "LANPONG_START_TRIGGER";
/// Relay start announcement: `scheduled` or `signal`.
pub const ENV_RELAY_START: &str = "LANPONG_RELAY_START";
/// Seconds between both seats filling and the scheduled start.
pub const ENV_START_DELAY_SECS: &str = "LANPONG_START_DELAY_SECS";
/// Client log file.
pub const ENV_LOG_FILE: &str = "LANPONG_LOG_FILE";

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:4000";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4000";
pub const DEFAULT_LOG_FILE: &str = "lanpong-client.log";

mod env_parse {
    use std::time::Duration;

    use super::{NetError, Result};

    pub fn parse_millis(key: &str) -> Option<Result<Duration>> {
        std::env::var(key).ok().map(|val| {
            val.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| NetError::Config(format!("invalid {key}: {e}")))
        })
    }

    pub fn parse_i64(key: &str) -> Option<Result<i64>> {
        std::env::var(key).ok().map(|val| {
            val.parse()
                .map_err(|e| NetError::Config(format!("invalid {key}: {e}")))
        })
    }

    pub fn parse_with<T: std::str::FromStr<Err = NetError>>(key: &str) -> Option<Result<T>> {
        std::env::var(key).ok().map(|val| val.parse())
    }
}

/// Per-connection transport limits.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub connect_timeout: Duration,
    /// Upper bound on bytes pulled from the socket in one refill.
    pub max_read_per_poll: usize,
    /// Upper bound on bytes queued for a socket that is not draining.
    pub max_pending_send: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            max_read_per_poll: 64 * 1024,
            max_pending_send: 64 * 1024,
        }
    }
}

/// What lets a client leave Waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartTrigger {
    /// `welcome`, then `start,<epoch>` once the local clock reaches it.
    #[default]
    Scheduled,
    /// `welcome`, then a bare `start`.
    Signal,
    /// A completed TCP connect is treated as ready. Kept for parity with the
    /// hosted prototype; it skips the handshake entirely.
    Connected,
}

impl FromStr for StartTrigger {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "signal" => Ok(Self::Signal),
            "connected" => Ok(Self::Connected),
            other => Err(NetError::Config(format!("unknown start trigger '{other}'"))),
        }
    }
}

/// How the relay announces the start of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStart {
    Scheduled { delay_secs: i64 },
    Signal,
}

impl Default for RelayStart {
    fn default() -> Self {
        Self::Scheduled { delay_secs: 3 }
    }
}

impl FromStr for RelayStart {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(Self::default()),
            "signal" => Ok(Self::Signal),
            other => Err(NetError::Config(format!("unknown relay start '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub start_trigger: StartTrigger,
    pub tick: Duration,
    pub link: LinkConfig,
    pub log_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            start_trigger: StartTrigger::default(),
            tick: Duration::from_millis(16),
            link: LinkConfig::default(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl ClientConfig {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            ..Self::default()
        }
    }

    pub fn with_start_trigger(mut self, trigger: StartTrigger) -> Self {
        self.start_trigger = trigger;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.link.connect_timeout = timeout;
        self
    }

    /// Applies environment overrides on top of `self`.
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(addr) = std::env::var(ENV_SERVER_ADDR) {
            self.server_addr = addr;
        }
        if let Some(timeout) = env_parse::parse_millis(ENV_CONNECT_TIMEOUT_MS) {
            self.link.connect_timeout = timeout?;
        }
        if let Some(tick) = env_parse::parse_millis(ENV_TICK_MS) {
            self.tick = tick?;
        }
        if let Some(trigger) = env_parse::parse_with(ENV_START_TRIGGER) {
            self.start_trigger = trigger?;
        }
        if let Ok(path) = std::env::var(ENV_LOG_FILE) {
            self.log_file = PathBuf::from(path);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_addr.is_empty() {
            return Err(NetError::Config("server address is empty".into()));
        }
        if self.tick.is_zero() {
            return Err(NetError::Config("tick period must be non-zero".into()));
        }
        if self.link.connect_timeout.is_zero() {
            return Err(NetError::Config("connect timeout must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub start: RelayStart,
    pub tick: Duration,
    pub link: LinkConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            start: RelayStart::default(),
            tick: Duration::from_millis(16),
            link: LinkConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Self::default()
        }
    }

    pub fn with_start(mut self, start: RelayStart) -> Self {
        self.start = start;
        self
    }

    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(addr) = std::env::var(ENV_BIND_ADDR) {
            self.bind_addr = addr;
        }
        if let Some(tick) = env_parse::parse_millis(ENV_TICK_MS) {
            self.tick = tick?;
        }
        if let Some(start) = env_parse::parse_with(ENV_RELAY_START) {
            self.start = start?;
        }
        if let Some(delay) = env_parse::parse_i64(ENV_START_DELAY_SECS) {
            let delay_secs = delay?;
            if delay_secs < 0 {
                return Err(NetError::Config(format!(
                    "{ENV_START_DELAY_SECS} must not be negative"
                )));
            }
            if let RelayStart::Scheduled { .. } = self.start {
                self.start = RelayStart::Scheduled { delay_secs };
            }
        }
        if self.tick.is_zero() {
            return Err(NetError::Config("tick period must be non-zero".into()));
        }
        Ok(self)
    }
}
