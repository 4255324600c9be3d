use std::{env, fs, path::PathBuf, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration for the gateway, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Platform API credentials
    pub api_id: i32,
    pub api_hash: String,

    // Moderation / account-linking backend
    pub backend_url: String,

    // HTTP surface
    pub host: String,
    pub port: u16,

    // Uploaded-image spool
    pub temp_dir: PathBuf,

    // Timing
    pub draft_poll_interval: Duration,
    pub transport_timeout: Duration,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let api_id = env_str("MULTIPOST_API_ID")
            .and_then(|s| s.parse::<i32>().ok())
            .ok_or_else(|| {
                Error::Config("MULTIPOST_API_ID environment variable is required".to_string())
            })?;
        let api_hash = env_str("MULTIPOST_API_HASH").unwrap_or_default();
        if api_hash.trim().is_empty() {
            return Err(Error::Config(
                "MULTIPOST_API_HASH environment variable is required".to_string(),
            ));
        }

        let backend_url =
            env_str("MULTIPOST_BACKEND_URL").unwrap_or_else(|| "http://app:8080".to_string());

        let host = env_str("MULTIPOST_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_u64("MULTIPOST_PORT").unwrap_or(8001) as u16;

        let temp_dir = PathBuf::from(
            env_str("MULTIPOST_TEMP_DIR").unwrap_or_else(|| "/tmp/multipost-images".to_string()),
        );
        fs::create_dir_all(&temp_dir)?;

        let draft_poll_interval =
            Duration::from_secs(env_u64("MULTIPOST_DRAFT_POLL_SECS").unwrap_or(60));
        let transport_timeout =
            Duration::from_secs(env_u64("MULTIPOST_TRANSPORT_TIMEOUT_SECS").unwrap_or(120));
        let upstream_timeout =
            Duration::from_secs(env_u64("MULTIPOST_UPSTREAM_TIMEOUT_SECS").unwrap_or(10));

        Ok(Self {
            api_id,
            api_hash,
            backend_url,
            host,
            port,
            temp_dir,
            draft_poll_interval,
            transport_timeout,
            upstream_timeout,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|v| v.trim().parse().ok())
}
