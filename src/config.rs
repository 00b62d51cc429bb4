use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use axum::http::HeaderValue;
use tracing::{info, warn};

use crate::auth::Credentials;
use crate::error::AppError;

pub const HOST_VAR: &str = "DASHBOARD_HOST";
pub const PORT_VAR: &str = "DASHBOARD_PORT";
pub const DATA_VAR: &str = "DASHBOARD_DATA";
pub const USERS_VAR: &str = "DASHBOARD_USERS";
pub const CORS_VAR: &str = "DASHBOARD_CORS_ORIGIN";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_path: PathBuf,
    pub users: Credentials,
    /// Browser origins allowed to call the API cross-site. Empty disables CORS.
    pub cors_origins: Vec<HeaderValue>,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let users = Credentials::parse(&lookup(USERS_VAR).unwrap_or_default())?;
        if users.is_empty() {
            warn!("{USERS_VAR} not set, dashboard API is not login-gated");
        }

        Ok(Self {
            host: try_load(&lookup, HOST_VAR, "127.0.0.1")?,
            port: try_load(&lookup, PORT_VAR, "8080")?,
            data_path: try_load(&lookup, DATA_VAR, "./transaction_data.csv")?,
            users,
            cors_origins: parse_origins(&lookup(CORS_VAR).unwrap_or_default())?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Comma separated origins such as `https://ops.example.com`.
fn parse_origins(list: &str) -> Result<Vec<HeaderValue>, AppError> {
    list.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|origin| {
            if origin == "*" {
                return Err(AppError::Config(format!(
                    "{CORS_VAR} must list origins explicitly, not \"*\""
                )));
            }
            HeaderValue::from_str(origin)
                .map_err(|e| AppError::Config(format!("invalid {CORS_VAR} entry {origin:?}: {e}")))
        })
        .collect()
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, AppError>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| AppError::Config(format!("invalid {key} value: {e}")))
}
