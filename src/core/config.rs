use std::env;
use std::time::Duration;

use anyhow::{Result, anyhow};

const DEFAULT_SYSTEM_MESSAGE: &str = "You are CaseCrux Legal Assistant, an AI helper for legal \
document analysis. You help users understand their legal documents and summaries. Explain \
complex legal terms in simple language, use markdown formatting, and always include a \
disclaimer when giving anything that resembles legal advice.";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_timeout: Duration,
    pub system_message: String,
    pub max_sessions: usize,
    // Emit `event: error` before closing a stream that failed upstream
    pub stream_error_frame: bool,
    // Include internal error chains in 5xx responses
    pub expose_error_details: bool,
}

impl AppConfig {
    /// Build the config from environment variables. The upstream API
    /// key is the only required value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from any variable source, `lookup` returns
    /// `None` for unset names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(anyhow!("Missing env var OPENAI_API_KEY"))?;
        let openai_api_hostname = lookup("OPENAI_API_HOSTNAME")
            .unwrap_or_else(|| "https://api.groq.com/openai".to_string());
        let openai_model =
            lookup("OPENAI_MODEL").unwrap_or_else(|| "llama3-70b-8192".to_string());
        let openai_timeout = parse_var(&lookup, "OPENAI_TIMEOUT_SECS", 300)?;
        let system_message = lookup("CHAT_SYSTEM_MESSAGE")
            .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.to_string());
        let max_sessions = parse_var(&lookup, "CHAT_MAX_SESSIONS", 1000)?;
        let stream_error_frame = parse_var(&lookup, "CHAT_STREAM_ERROR_FRAME", true)?;
        let expose_error_details = lookup("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        Ok(Self {
            openai_api_hostname,
            openai_api_key,
            openai_model,
            openai_timeout: Duration::from_secs(openai_timeout),
            system_message,
            max_sessions,
            stream_error_frame,
            expose_error_details,
        })
    }

    /// Config for tests and local tooling that never reads the
    /// environment.
    pub fn with_api_key(openai_api_key: &str) -> Self {
        Self {
            openai_api_hostname: "https://api.groq.com/openai".to_string(),
            openai_api_key: openai_api_key.to_string(),
            openai_model: "llama3-70b-8192".to_string(),
            openai_timeout: Duration::from_secs(300),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            max_sessions: 1000,
            stream_error_frame: true,
            expose_error_details: false,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid value for {}: {}", name, e)),
        None => Ok(default),
    }
}
