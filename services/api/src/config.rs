use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub llm_api_key: SecretString,
    pub llm_base_url: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub cartesia_api_key: SecretString,
    pub cartesia_base_url: String,
    pub cartesia_version: String,
    pub cartesia_model: String,
    pub cartesia_voice_id: String,
    pub google_cse_api_key: Option<SecretString>,
    pub google_cse_id: Option<String>,
    pub knowledge_catalog_url: String,
    pub prompts_path: PathBuf,
    pub upstream_timeout: Duration,
    pub max_upload_bytes: usize,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required_secret(name: &str) -> Result<SecretString, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn parsed<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address = parsed::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:3000")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let llm_api_key = required_secret("LLM_API_KEY")?;
        let cartesia_api_key = required_secret("CARTESIA_API_KEY")?;

        let google_cse_api_key = std::env::var("GOOGLE_CSE_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::from);
        let google_cse_id = std::env::var("GOOGLE_CSE_ID")
            .ok()
            .filter(|v| !v.is_empty());

        let upstream_timeout = Duration::from_secs(parsed::<u64>("UPSTREAM_TIMEOUT_SECS", "30")?);
        let max_upload_bytes = parsed::<usize>("MAX_UPLOAD_BYTES", "26214400")?;

        Ok(Self {
            bind_address,
            log_level,
            llm_api_key,
            llm_base_url: var_or("LLM_BASE_URL", "https://api.groq.com/openai/v1"),
            chat_model: var_or("CHAT_MODEL", "llama3-8b-8192"),
            transcription_model: var_or("TRANSCRIPTION_MODEL", "whisper-large-v3"),
            cartesia_api_key,
            cartesia_base_url: var_or("CARTESIA_BASE_URL", "https://api.cartesia.ai"),
            cartesia_version: var_or("CARTESIA_VERSION", "2024-06-30"),
            cartesia_model: var_or("CARTESIA_MODEL", "sonic-english"),
            cartesia_voice_id: var_or("CARTESIA_VOICE_ID", "bd9120b6-7761-47a6-a446-77ca49132781"),
            google_cse_api_key,
            google_cse_id,
            knowledge_catalog_url: var_or(
                "KNOWLEDGE_CATALOG_URL",
                "https://aitekph.com/knowledge-products.json",
            ),
            prompts_path: PathBuf::from(var_or("PROMPTS_PATH", "./prompts")),
            upstream_timeout,
            max_upload_bytes,
        })
    }

    /// Web search is enabled only when both the key and the engine id are set.
    pub fn web_search_enabled(&self) -> bool {
        self.google_cse_api_key.is_some() && self.google_cse_id.is_some()
    }
}
