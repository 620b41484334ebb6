use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub openai_api_key: String,
    pub completion_url: String,
    pub model: String,
    pub completion_timeout: Duration,
    pub fetch_timeout: Duration,
    pub fetch_user_agent: String,
    pub request_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::ConfigError("OPENAI_API_KEY is not set".to_string()))?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let completion_url = lookup("COMPLETION_URL").unwrap_or_else(|| DEFAULT_COMPLETION_URL.to_string());
        let model = lookup("COMPLETION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let fetch_user_agent = lookup("FETCH_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            openai_api_key,
            completion_url,
            model,
            completion_timeout: secs(&lookup, "COMPLETION_TIMEOUT_SECS", 60)?,
            fetch_timeout: secs(&lookup, "FETCH_TIMEOUT_SECS", 10)?,
            fetch_user_agent,
            request_timeout: secs(&lookup, "REQUEST_TIMEOUT_SECS", 90)?,
        })
    }
}

fn secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        None => Ok(Duration::from_secs(default)),
    }
}
