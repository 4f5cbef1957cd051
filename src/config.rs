use std::env;
use std::str::FromStr;

use lettre::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not configured")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

// Application configuration, loaded once at startup. Immutable afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub smtp_from: Address,
    pub from_name: String,
    pub api_key: String,
    pub rate_limit: u32,
    pub rate_window_secs: u64,
    pub max_subject_length: usize,
    pub max_body_length: usize,
    pub port: u16,
    pub log_file: Option<String>,
}

impl Config {
    /// Read the configuration from the process environment. Missing or
    /// unparseable required values abort startup; nothing here is read
    /// again per request.
    pub fn from_env() -> Result<Self, ConfigError> {
        let smtp_user = required("SMTP_USER")?;
        let smtp_password = required("SMTP_PASSWORD")?;
        let api_key = required("API_KEY")?;

        let from_raw = var_or("SMTP_FROM", &smtp_user);
        let smtp_from = Address::from_str(&from_raw).map_err(|_| ConfigError::Invalid {
            name: "SMTP_FROM",
            value: from_raw.clone(),
        })?;

        // Empty LOG_FILE disables file logging entirely.
        let log_file = match var_or("LOG_FILE", "email_gateway.log") {
            s if s.is_empty() => None,
            s => Some(s),
        };

        Ok(Config {
            smtp_host: var_or("SMTP_HOST", "smtp.gmail.com"),
            smtp_port: parsed("SMTP_PORT", "587")?,
            smtp_user,
            smtp_password,
            smtp_from,
            from_name: var_or("FROM_NAME", "Email Gateway"),
            api_key,
            rate_limit: parsed("RATE_LIMIT_PER_HOUR", "100")?,
            rate_window_secs: parsed("RATE_LIMIT_WINDOW_SECS", "3600")?,
            max_subject_length: parsed("MAX_SUBJECT_LENGTH", "200")?,
            max_body_length: parsed("MAX_BODY_LENGTH", "10000")?,
            port: parsed("PORT", "5000")?,
            log_file,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let raw = var_or(name, default);
    raw.parse()
        .map_err(|_| ConfigError::Invalid { name, value: raw })
}
