use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use url_features::{BatchConfig, ExtractorConfig, FetchConfig, PacingConfig, RegistryConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub model_path: PathBuf,
    pub tavily_api_key: Option<String>,
    pub rdap_base_url: Option<String>,
    pub insecure_transport: bool,
    pub batch_concurrency: usize,
    pub batch_chunk_size: usize,
    /// Outbound pacing points per second; 0 or unset means no cap
    pub rate_limit_rps: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            port: lookup("PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .context("MODEL_PATH must be set")?,
            tavily_api_key: lookup("TAVILY_API_KEY").filter(|k| !k.is_empty()),
            rdap_base_url: lookup("RDAP_BASE_URL").filter(|u| !u.is_empty()),
            insecure_transport: parse_bool(lookup("INSECURE_TRANSPORT"), true)
                .context("INSECURE_TRANSPORT must be true or false")?,
            batch_concurrency: lookup("BATCH_CONCURRENCY")
                .unwrap_or_else(|| "1".to_string())
                .parse()
                .context("BATCH_CONCURRENCY must be a valid number")?,
            batch_chunk_size: lookup("BATCH_CHUNK_SIZE")
                .unwrap_or_else(|| "25".to_string())
                .parse()
                .context("BATCH_CHUNK_SIZE must be a valid number")?,
            rate_limit_rps: lookup("RATE_LIMIT_RPS")
                .unwrap_or_else(|| "0".to_string())
                .parse()
                .context("RATE_LIMIT_RPS must be a valid number")?,
        };

        if config.batch_concurrency == 0 || config.batch_chunk_size == 0 {
            bail!("BATCH_CONCURRENCY and BATCH_CHUNK_SIZE must be at least 1");
        }
        Ok(config)
    }

    /// Extraction settings for the live network stack.
    pub fn extractor_config(&self) -> ExtractorConfig {
        let mut registry = RegistryConfig::default();
        if let Some(base) = &self.rdap_base_url {
            registry.rdap_base_url = base.trim_end_matches('/').to_string();
        }

        let mut config = ExtractorConfig::new()
            .with_fetch(FetchConfig::new().with_insecure_transport(self.insecure_transport))
            .with_registry(registry)
            .with_pacing(PacingConfig::default().with_rate_limit(self.rate_limit_rps));
        if let Some(key) = &self.tavily_api_key {
            config = config.with_tavily_api_key(key.clone());
        }
        config
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig::new()
            .with_chunk_size(self.batch_chunk_size)
            .with_concurrency(self.batch_concurrency)
    }
}

fn parse_bool(raw: Option<String>, default: bool) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: {}", other),
    }
}
