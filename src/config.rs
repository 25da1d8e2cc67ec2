//! Configuration management for the property agent.
//!
//! Configuration is read once at startup from environment variables:
//! - `SYM_BASE_URL` - Required. Base URL of the property management API.
//! - `SYM_API_EMAIL` - Required. Login user for the API.
//! - `SYM_API_PASSWORD` - Required. Login password for the API.
//! - `OPENAI_API_KEY` - Required. Key for the chat completions endpoint.
//! - `OPENAI_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `OPENAI_MODEL` - Optional. Defaults to `gpt-4o-mini`.
//! - `MAX_TURNS` - Optional. Maximum tool-calling turns per run. Defaults to `6`.
//! - `SYM_TOKEN_TTL_SECS` - Optional. Bearer token reuse window. Defaults to `3300`.
//! - `SYM_TOKEN_FIELDS` - Optional. Comma-separated login response fields probed for the token.
//! - `SYM_TOKEN_CACHE_PATH` - Optional. JSON file used to share the token across invocations.
//! - `SYM_POSTMAN_PATH` - Optional. Postman collection backing the endpoint search tool.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::api::{ClientOptions, DEFAULT_TOKEN_FIELDS, DEFAULT_TOKEN_TTL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection settings for the property management API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, without trailing slash
    pub base_url: String,

    /// Login user
    pub username: String,

    /// Login password
    pub password: String,

    /// How long a bearer token is reused before a fresh login
    pub token_ttl: Duration,

    /// Login response fields probed for the token, in order
    pub token_fields: Vec<String>,

    /// Optional file shared between invocations to reuse a token
    pub token_cache_path: Option<PathBuf>,
}

impl ApiConfig {
    /// Client options derived from this configuration.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            token_ttl: self.token_ttl,
            token_fields: self.token_fields.clone(),
            ..ClientOptions::default()
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Property management API settings
    pub api: ApiConfig,

    /// Chat completions API key
    pub openai_api_key: String,

    /// Chat completions base URL
    pub openai_base_url: String,

    /// Default chat model
    pub default_model: String,

    /// Maximum tool-calling turns per run
    pub max_turns: usize,

    /// Postman collection for endpoint search
    pub postman_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if a required variable is unset and
    /// `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = require("SYM_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidValue("SYM_BASE_URL".to_string(), e.to_string()))?;

        let username = require("SYM_API_EMAIL")?;
        let password = require("SYM_API_PASSWORD")?;
        let openai_api_key = require("OPENAI_API_KEY")?;

        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let default_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let max_turns = parse_var("MAX_TURNS")?.unwrap_or(6);

        let token_ttl = parse_var::<u64>("SYM_TOKEN_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);

        let token_fields = std::env::var("SYM_TOKEN_FIELDS")
            .ok()
            .map(|v| parse_field_list(&v))
            .filter(|fields| !fields.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_FIELDS.iter().map(|f| f.to_string()).collect());

        let token_cache_path = std::env::var("SYM_TOKEN_CACHE_PATH").ok().map(PathBuf::from);
        let postman_path = std::env::var("SYM_POSTMAN_PATH").ok().map(PathBuf::from);

        Ok(Self {
            api: ApiConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                username,
                password,
                token_ttl,
                token_fields,
                token_cache_path,
            },
            openai_api_key,
            openai_base_url,
            default_model,
            max_turns,
            postman_path,
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(name)
        .ok()
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))
        })
        .transpose()
}

fn parse_field_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}
