// src/config.rs
use crate::errors::ConciergeError;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const MAX_EDGE: u32 = 1000;
pub const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub request_timeout: Duration,
    pub decode_timeout: Duration,
    pub max_input_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConciergeError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConciergeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("API_KEY")
            .or_else(|| get("GEMINI_API_KEY"))
            .ok_or_else(|| {
                ConciergeError::Auth("API_KEY (or GEMINI_API_KEY) must be set".to_string())
            })?;

        let api_base = get("GEMINI_API_BASE")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let model = get("CONCIERGE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let request_timeout = Duration::from_secs(parse_or(
            get("CONCIERGE_REQUEST_TIMEOUT_SECS"),
            "CONCIERGE_REQUEST_TIMEOUT_SECS",
            90,
        )?);
        let decode_timeout = Duration::from_secs(parse_or(
            get("CONCIERGE_DECODE_TIMEOUT_SECS"),
            "CONCIERGE_DECODE_TIMEOUT_SECS",
            10,
        )?);
        let max_input_bytes = parse_or(
            get("CONCIERGE_MAX_INPUT_BYTES"),
            "CONCIERGE_MAX_INPUT_BYTES",
            25 * 1024 * 1024,
        )?;

        Ok(Self {
            api_key,
            api_base,
            model,
            request_timeout,
            decode_timeout,
            max_input_bytes,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConciergeError> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConciergeError::Unknown(format!("Invalid value for {}: {}", name, raw))),
        None => Ok(default),
    }
}
