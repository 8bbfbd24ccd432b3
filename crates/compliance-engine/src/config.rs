//! Engine configuration
//!
//! TOML-based settings for the reasoning provider, the retry policy and the
//! run pipeline. Every field has a default, so an empty file is a valid
//! configuration. The provider credential is never part of the file; only the
//! name of the environment variable holding it is.

use crate::retry::RetryPolicy;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - A value is out of range (see [`EngineConfig::validate`])
    ///
    /// # Example
    ///
    /// ```no_run
    /// use compliance_engine::config::EngineConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = EngineConfig::from_file("permit-check.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use compliance_engine::config::EngineConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = EngineConfig::from_str(r#"
    ///     [pipeline]
    ///     max_concurrency = 8
    /// "#)?;
    /// assert_eq!(config.pipeline.max_concurrency, 8);
    /// # Ok(())
    /// # }
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run unbounded or impossible.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.retry.max_attempts >= 1, "retry.max_attempts must be at least 1");
        ensure!(
            self.retry.max_delay_ms >= self.retry.base_delay_ms,
            "retry.max_delay_ms must not be below retry.base_delay_ms"
        );
        ensure!(
            self.pipeline.max_concurrency >= 1,
            "pipeline.max_concurrency must be at least 1"
        );
        ensure!(
            self.reasoning.requests_per_minute >= 1,
            "reasoning.requests_per_minute must be at least 1"
        );
        ensure!(
            (0.0..=2.0).contains(&self.reasoning.temperature),
            "reasoning.temperature must be between 0.0 and 2.0"
        );
        Ok(())
    }
}

/// Reasoning provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key (default: OPENAI_API_KEY)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Low temperature keeps verdicts reproducible (default: 0.2)
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Provider-side quota ceiling (default: 60)
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

impl ReasoningConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_requests_per_minute() -> u32 {
    60
}

/// Retry settings for reasoning calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, first one included (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles afterwards (default: 500)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

/// Run pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Reasoning calls in flight at once (default: 4)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Abort unissued calls after this many seconds, 0 disables (default: 1800)
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    /// Permits with less extracted text fail with `ExtractionEmpty` (default: 200)
    #[serde(default = "default_min_permit_chars")]
    pub min_permit_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            run_timeout_secs: default_run_timeout_secs(),
            min_permit_chars: default_min_permit_chars(),
        }
    }
}

impl PipelineConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }
}

fn default_max_concurrency() -> usize {
    4
}

fn default_run_timeout_secs() -> u64 {
    1_800
}

fn default_min_permit_chars() -> usize {
    200
}
