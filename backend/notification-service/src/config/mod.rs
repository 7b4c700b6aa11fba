use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;
use jwt_security::{validate_secret_strength, SecretStrength};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub app: AppConfig,
    pub websocket: WebSocketConfig,
    pub jwt_secret: String,
    /// Grade of `jwt_secret`; weak secrets only load in development
    pub secret_strength: SecretStrength,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.env.eq_ignore_ascii_case("development")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Server-side keepalive for gateway sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebSocketConfig {
    /// Ping period; zero disables the heartbeat entirely
    pub heartbeat_interval: Duration,
    /// Inactivity window after which a session is closed
    pub client_timeout: Duration,
}

impl WebSocketConfig {
    pub fn heartbeat_enabled(&self) -> bool {
        !self.heartbeat_interval.is_zero()
    }

    pub fn disabled() -> Self {
        Self {
            heartbeat_interval: Duration::ZERO,
            client_timeout: Duration::ZERO,
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            client_timeout: Duration::from_secs(45),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app", &self.app)
            .field("websocket", &self.websocket)
            .field("jwt_secret", &"<redacted>")
            .field("secret_strength", &self.secret_strength)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load from the process environment (after reading `.env` if present)
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let app = AppConfig {
            env: get("APP_ENV", "development"),
            host: get("HOST", "0.0.0.0"),
            port: parse_var("PORT", &get("PORT", "8000"))?,
        };

        let websocket = WebSocketConfig {
            heartbeat_interval: Duration::from_secs(parse_var(
                "WS_HEARTBEAT_INTERVAL_SECS",
                &get("WS_HEARTBEAT_INTERVAL_SECS", "15"),
            )?),
            client_timeout: Duration::from_secs(parse_var(
                "WS_CLIENT_TIMEOUT_SECS",
                &get("WS_CLIENT_TIMEOUT_SECS", "45"),
            )?),
        };

        if websocket.heartbeat_enabled() && websocket.client_timeout <= websocket.heartbeat_interval
        {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must be greater than WS_HEARTBEAT_INTERVAL_SECS".into(),
            ));
        }

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Config("JWT_SECRET must be set".into()))?;

        let secret_strength = validate_secret_strength(&jwt_secret);
        if secret_strength == SecretStrength::Weak && !app.is_development() {
            return Err(AppError::Config(format!(
                "JWT_SECRET is too weak for APP_ENV={}",
                app.env
            )));
        }

        let log_format = get("LOG_FORMAT", "text")
            .parse::<LogFormat>()
            .map_err(AppError::Config)?;

        Ok(Config {
            app,
            websocket,
            jwt_secret,
            secret_strength,
            log_format,
        })
    }

    /// Warnings about values that loaded but should be changed
    ///
    /// Kept out of loading so they go through the subscriber built from
    /// `log_format`.
    pub fn warnings(&self) -> Vec<&'static str> {
        match self.secret_strength {
            SecretStrength::Weak => {
                vec!["JWT_SECRET is weak; accepted only because APP_ENV=development"]
            }
            SecretStrength::Acceptable => {
                vec!["JWT_SECRET is acceptable but shorter than recommended 64 bytes"]
            }
            SecretStrength::Strong => Vec::new(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{key} has invalid value '{raw}'")))
}
