use std::env;
use std::time::Duration;
use thiserror::Error;
use wyoming_protocol::{ClientConfig, DEFAULT_PORT};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },
}

/// Gateway settings, loaded from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub wyoming_host: String,
    pub wyoming_port: u16,
    pub default_voice: String,
    pub timeout_ms: u64,
    pub max_text_length: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            wyoming_host: "localhost".to_string(),
            wyoming_port: DEFAULT_PORT,
            default_voice: "en_US-lessac-medium".to_string(),
            timeout_ms: 30_000,
            max_text_length: 5_000,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |var: &str, default: String| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        Ok(Self {
            wyoming_host: text("WYOMING_HOST", defaults.wyoming_host),
            wyoming_port: parse_var(&lookup, "WYOMING_PORT", defaults.wyoming_port)?,
            default_voice: text("TTS_DEFAULT_VOICE", defaults.default_voice),
            timeout_ms: positive(
                "TTS_TIMEOUT_MS",
                parse_var(&lookup, "TTS_TIMEOUT_MS", defaults.timeout_ms)?,
            )?,
            max_text_length: parse_var(
                &lookup,
                "TTS_MAX_TEXT_LENGTH",
                defaults.max_text_length,
            )?,
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.wyoming_host.clone(),
            port: self.wyoming_port,
            idle_timeout: self.idle_timeout(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(default);
    }
    value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        var: var.to_string(),
        value: raw.clone(),
        reason: e.to_string(),
    })
}

fn positive(var: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

/// Load configuration with helpful error messages for development
pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    match GatewayConfig::load() {
        Ok(config) => {
            log::info!(
                "Loaded gateway configuration: {}:{} (voice: {}, timeout: {}ms)",
                config.wyoming_host,
                config.wyoming_port,
                config.default_voice,
                config.timeout_ms
            );
            Ok(config)
        }
        Err(e) => {
            log::error!("Configuration error: {}", e);
            Err(e)
        }
    }
}
