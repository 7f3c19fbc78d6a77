use std::{env, fmt::Display, net::SocketAddr, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::info;

pub mod cors;
pub mod security;

pub use cors::cors_layer;
pub use security::SecurityHeadersLayer;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailTransport {
    /// Write messages to the log instead of delivering them.
    Log,
    Smtp(SmtpConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub ttl: Duration,
    pub max_attempts: i32,
    pub resend_cooldown: Duration,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_attempts: 5,
            resend_cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub otp: OtpSettings,
    pub token_ttl: Duration,
    pub cleanup_interval: Duration,
    pub mail_transport: MailTransport,
    pub mail_from: String,
    pub cors_allowed_origins: String,
    /// `RUST_ENV=production`; enables HSTS.
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let otp = OtpSettings {
            ttl: Duration::from_secs(parse_or("OTP_TTL_SECS", 600u64)?),
            max_attempts: parse_or("OTP_MAX_ATTEMPTS", 5i32)?,
            resend_cooldown: Duration::from_secs(parse_or("OTP_RESEND_COOLDOWN_SECS", 60u64)?),
        };
        if otp.max_attempts < 1 {
            return Err(ConfigError::Invalid {
                key: "OTP_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        let token_ttl_days: u64 = parse_or("TOKEN_TTL_DAYS", 30)?;

        Ok(Self {
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            bind_addr: parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3001)))?,
            otp,
            token_ttl: Duration::from_secs(token_ttl_days * 24 * 60 * 60),
            cleanup_interval: Duration::from_secs(parse_or("CLEANUP_INTERVAL_SECS", 3600u64)?),
            mail_transport: mail_transport_from_env()?,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Tickets <no-reply@localhost>".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
            production: env::var("RUST_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
        })
    }

    /// Development defaults around a database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            database_max_connections: 5,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            otp: OtpSettings::default(),
            token_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            cleanup_interval: Duration::from_secs(3600),
            mail_transport: MailTransport::Log,
            mail_from: "Tickets <no-reply@localhost>".to_string(),
            cors_allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
            production: false,
        }
    }
}

fn mail_transport_from_env() -> Result<MailTransport, ConfigError> {
    let kind = env::var("MAIL_TRANSPORT").unwrap_or_else(|_| "log".to_string());

    match kind.to_lowercase().as_str() {
        "log" => Ok(MailTransport::Log),
        "smtp" => Ok(MailTransport::Smtp(SmtpConfig {
            host: env::var("SMTP_HOST").map_err(|_| ConfigError::Missing("SMTP_HOST"))?,
            port: parse_or("SMTP_PORT", 587)?,
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
        })),
        other => Err(ConfigError::Invalid {
            key: "MAIL_TRANSPORT",
            reason: format!("unknown transport '{}', expected 'log' or 'smtp'", other),
        }),
    }
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_accepts_padded_numbers() {
        let port: u16 = parse_value("SMTP_PORT", " 2525 ").unwrap();
        assert_eq!(port, 2525);
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let err = parse_value::<u64>("OTP_TTL_SECS", "ten minutes").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OTP_TTL_SECS", .. }));
    }

    #[test]
    fn test_parse_socket_addr() {
        let addr: SocketAddr = parse_value("BIND_ADDR", "127.0.0.1:8080").unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_otp_defaults() {
        let otp = OtpSettings::default();
        assert_eq!(otp.ttl, Duration::from_secs(600));
        assert_eq!(otp.max_attempts, 5);
    }
}
