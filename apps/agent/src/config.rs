//! Agent configuration, read from the environment.

use anyhow::{bail, Context, Result};
use std::time::Duration;

use storefront_api_client::{DEFAULT_PROBE_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS};

pub const API_URL_VAR: &str = "STOREFRONT_API_URL";
pub const ACCESS_TOKEN_VAR: &str = "STOREFRONT_ACCESS_TOKEN";
pub const DATA_DIR_VAR: &str = "STOREFRONT_DATA_DIR";
pub const PROBE_INTERVAL_VAR: &str = "STOREFRONT_PROBE_INTERVAL_SECS";
pub const REQUEST_TIMEOUT_VAR: &str = "STOREFRONT_REQUEST_TIMEOUT_SECS";

const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_url: String,
    pub access_token: Option<String>,
    pub data_dir: String,
    pub probe_interval: Duration,
    pub request_timeout: Duration,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = value(API_URL_VAR)
            .map(|v| v.trim_end_matches('/').to_string())
            .with_context(|| format!("{} must be set", API_URL_VAR))?;
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            bail!("{} must be an http(s) URL, got '{}'", API_URL_VAR, api_url);
        }

        Ok(Self {
            api_url,
            access_token: value(ACCESS_TOKEN_VAR),
            data_dir: value(DATA_DIR_VAR).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            probe_interval: seconds(
                value(PROBE_INTERVAL_VAR),
                PROBE_INTERVAL_VAR,
                DEFAULT_PROBE_INTERVAL_SECS,
            )?,
            request_timeout: seconds(
                value(REQUEST_TIMEOUT_VAR),
                REQUEST_TIMEOUT_VAR,
                DEFAULT_TIMEOUT_SECS,
            )?,
        })
    }
}

fn seconds(raw: Option<String>, name: &str, default: u64) -> Result<Duration> {
    let secs = match raw {
        None => default,
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{} must be a whole number of seconds", name))?,
    };
    if secs == 0 {
        bail!("{} must be greater than zero", name);
    }
    Ok(Duration::from_secs(secs))
}
