//! Configuration types.
//!
//! Everything is read once at startup and injected into the controller;
//! nothing here changes for the lifetime of the process.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::schedule::{DEFAULT_SCHEDULE, Schedule};

/// Mail account used for both outbound relays and the watched inbox.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub email: EmailConfig,
    /// Where relayed messages and command acknowledgements are sent.
    pub operator_address: String,
    pub schedule: Schedule,
    /// Reply-watcher poll interval.
    pub poll_interval: Duration,
    /// Sleep between cycles, and while paused.
    pub cycle_interval: Duration,
    /// Sleep while the schedule gate is closed.
    pub gated_interval: Duration,
    pub chat_db_path: PathBuf,
    pub state_path: PathBuf,
}

impl BridgeConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_host = required("EMAIL_IMAP_HOST")?;
        let imap_port = parsed_or("EMAIL_IMAP_PORT", 993)?;
        let smtp_host =
            std::env::var("EMAIL_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));
        let smtp_port = parsed_or("EMAIL_SMTP_PORT", 587)?;
        let username = required("EMAIL_USERNAME")?;
        let password = SecretString::from(required("EMAIL_PASSWORD")?);
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());
        let operator_address =
            std::env::var("RELAY_OPERATOR_ADDRESS").unwrap_or_else(|_| from_address.clone());

        let schedule = std::env::var("RELAY_SCHEDULE")
            .unwrap_or_else(|_| DEFAULT_SCHEDULE.to_string())
            .parse::<Schedule>()
            .map_err(|message| ConfigError::InvalidValue {
                key: "RELAY_SCHEDULE".into(),
                message,
            })?;

        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let chat_db_path = std::env::var("RELAY_CHAT_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(&home).join("Library/Messages/chat.db"));
        let state_path = std::env::var("RELAY_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(&home).join(".imessage_gmail_state.json"));

        Ok(Self {
            email: EmailConfig {
                imap_host,
                imap_port,
                smtp_host,
                smtp_port,
                username,
                password,
                from_address,
            },
            operator_address,
            schedule,
            poll_interval: Duration::from_secs(parsed_or("RELAY_POLL_INTERVAL_SECS", 30)?),
            cycle_interval: Duration::from_secs(parsed_or("RELAY_CYCLE_INTERVAL_SECS", 5)?),
            gated_interval: Duration::from_secs(parsed_or("RELAY_GATED_INTERVAL_SECS", 60)?),
            chat_db_path,
            state_path,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
