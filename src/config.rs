//! Client configuration.
//!
//! [`ClientConfig::default`] carries the stock values; [`ClientConfig::from_env`]
//! overlays `JSONWIRE_*` environment variables on top of them. Individual
//! values can also be set through [`ClientBuilder`](crate::ClientBuilder).

use std::time::Duration;

use crate::pending::DEFAULT_MAX_SEQUENCE_NUMBER;
use crate::writer::WriterConfig;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 10088;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_KEEPALIVE_ACTION: &str = "alive";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum concurrent inbound handlers.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

/// Everything the connection layer needs to know about its server and timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Reconnect attempts after a close/error before giving up.
    pub max_retries: u32,
    /// Fixed delay before each reconnect attempt.
    pub retry_delay: Duration,
    /// Default time a request waits for its response.
    pub response_timeout: Duration,
    /// Exclusive wrap boundary for sequence numbers.
    pub max_sequence_number: u32,
    /// Period of the keep-alive request while connected.
    pub keepalive_interval: Duration,
    /// `action` value of the keep-alive request.
    pub keepalive_action: String,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Inbound handlers allowed to run at once.
    pub max_concurrent_handlers: usize,
    /// Outbound writer settings.
    pub writer: WriterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_sequence_number: DEFAULT_MAX_SEQUENCE_NUMBER,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            keepalive_action: DEFAULT_KEEPALIVE_ACTION.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            writer: WriterConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Build config from environment variables.
    ///
    /// All optional; unset or unparseable values keep their default:
    /// - `JSONWIRE_HOST`, `JSONWIRE_PORT`
    /// - `JSONWIRE_MAX_RETRIES`, `JSONWIRE_RETRY_DELAY_MS`
    /// - `JSONWIRE_RESPONSE_TIMEOUT_MS`, `JSONWIRE_MAX_SEQUENCE_NUMBER`
    /// - `JSONWIRE_KEEPALIVE_INTERVAL_MS`, `JSONWIRE_KEEPALIVE_ACTION`
    /// - `JSONWIRE_CONNECT_TIMEOUT_MS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |key: &str, default: Duration| parse(key).map_or(default, Duration::from_millis);

        Self {
            host: lookup("JSONWIRE_HOST").unwrap_or(defaults.host),
            port: parse("JSONWIRE_PORT")
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(defaults.port),
            max_retries: parse("JSONWIRE_MAX_RETRIES")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_retries),
            retry_delay: millis("JSONWIRE_RETRY_DELAY_MS", defaults.retry_delay),
            response_timeout: millis("JSONWIRE_RESPONSE_TIMEOUT_MS", defaults.response_timeout),
            max_sequence_number: parse("JSONWIRE_MAX_SEQUENCE_NUMBER")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_sequence_number),
            keepalive_interval: millis("JSONWIRE_KEEPALIVE_INTERVAL_MS", defaults.keepalive_interval),
            keepalive_action: lookup("JSONWIRE_KEEPALIVE_ACTION").unwrap_or(defaults.keepalive_action),
            connect_timeout: millis("JSONWIRE_CONNECT_TIMEOUT_MS", defaults.connect_timeout),
            max_concurrent_handlers: defaults.max_concurrent_handlers,
            writer: defaults.writer,
        }
    }

    /// `host:port` for logging and dialing.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
