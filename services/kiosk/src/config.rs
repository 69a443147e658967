use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// WebSocket endpoint of the assistant backend.
    pub ws_url: String,
    /// HTTP address media paths are resolved against.
    pub base_url: String,
    pub log_level: Level,
    pub auto_start_mic_on_conversation_end: bool,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    /// `None` disables keep-alive pings.
    pub keepalive: Option<Duration>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let ws_url = std::env::var("KIOSK_WS_URL")
            .unwrap_or_else(|_| "ws://127.0.0.1:12393/client-ws".to_string());
        require_scheme("KIOSK_WS_URL", &ws_url, &["ws://", "wss://"])?;

        let base_url = std::env::var("KIOSK_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:12393".to_string());
        require_scheme("KIOSK_BASE_URL", &base_url, &["http://", "https://"])?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let auto_start_mic_on_conversation_end =
            match std::env::var("AUTO_START_MIC_ON_CONVERSATION_END") {
                Ok(value) => parse_bool("AUTO_START_MIC_ON_CONVERSATION_END", &value)?,
                Err(_) => false,
            };

        let reconnect_initial =
            Duration::from_millis(parse_number("RECONNECT_INITIAL_MS", 500)?);
        let reconnect_max = Duration::from_millis(parse_number("RECONNECT_MAX_MS", 30_000)?);
        if reconnect_max < reconnect_initial {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_MAX_MS".to_string(),
                "must not be smaller than RECONNECT_INITIAL_MS".to_string(),
            ));
        }

        let keepalive = match parse_number("KEEPALIVE_INTERVAL_SECS", 30)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            ws_url,
            base_url,
            log_level,
            auto_start_mic_on_conversation_end,
            reconnect_initial,
            reconnect_max,
            keepalive,
        })
    }
}

fn require_scheme(var: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    if schemes.iter().any(|scheme| value.starts_with(scheme)) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' must start with {}", value, schemes.join(" or ")),
        ))
    }
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' is not a boolean", value),
        )),
    }
}

fn parse_number(var: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
