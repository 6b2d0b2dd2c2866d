use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 1200;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_ROUTING_THRESHOLD: u8 = 80;
pub const DEFAULT_PROMPT: &str = "Feedback?";

pub const DEFAULT_LLM_PROVIDER: &str = "openai";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_MAX_RETRIES: u32 = 3;

/// Source of a configuration value, in descending precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Config,
    Programmatic,
    Default,
}

impl ConfigSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        }
    }
}

/// `[engine]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum engine execution time for one run, in seconds
    pub run_timeout_secs: Option<u64>,
    /// Concurrent query sub-tasks
    pub workers: Option<usize>,
    /// Feedback routing threshold on a 0-100 similarity scale
    pub routing_threshold: Option<u8>,
    /// Whether acceptance phrases finish the run without consulting the oracle
    pub acceptance_bypass: Option<bool>,
    /// Text shown with each draft
    pub prompt: Option<String>,
}

/// `[cache]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    pub dir: Option<PathBuf>,
}

/// `[sessions]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SessionsConfig {
    pub dir: Option<PathBuf>,
}

/// `[llm]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    /// Upper bound on LLM calls per process; unlimited when unset
    pub budget: Option<u32>,
    pub max_retries: Option<u32>,
}

/// CLI overrides, highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub run_timeout_secs: Option<u64>,
    pub routing_threshold: Option<u8>,
    pub workers: Option<usize>,
    pub model: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub sessions_dir: Option<PathBuf>,
}

/// Resolved configuration.
///
/// Unset values fall back to the `DEFAULT_*` constants through the accessor
/// methods, so a `Config::default()` is fully usable.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub sessions: SessionsConfig,
    pub llm: LlmConfig,
    /// Config file that was loaded, if any
    pub config_path: Option<PathBuf>,
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Config {
    #[must_use]
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(
            self.engine
                .run_timeout_secs
                .unwrap_or(DEFAULT_RUN_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.engine.workers.unwrap_or(DEFAULT_WORKERS)
    }

    #[must_use]
    pub fn routing_threshold(&self) -> u8 {
        self.engine
            .routing_threshold
            .unwrap_or(DEFAULT_ROUTING_THRESHOLD)
    }

    #[must_use]
    pub fn acceptance_bypass(&self) -> bool {
        self.engine.acceptance_bypass.unwrap_or(true)
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        self.engine.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }

    /// Index cache root; `<FORMLOOP_HOME>/cache` when unset.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| formloop_utils::paths::cache_dir().into_std_path_buf())
    }

    /// Snapshot directory; `<FORMLOOP_HOME>/sessions` when unset.
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.sessions
            .dir
            .clone()
            .unwrap_or_else(|| formloop_utils::paths::sessions_dir().into_std_path_buf())
    }

    #[must_use]
    pub fn llm_provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or(DEFAULT_LLM_PROVIDER)
    }

    #[must_use]
    pub fn llm_model(&self) -> &str {
        self.llm.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }

    #[must_use]
    pub fn llm_base_url(&self) -> &str {
        self.llm.base_url.as_deref().unwrap_or(DEFAULT_LLM_BASE_URL)
    }

    #[must_use]
    pub fn llm_api_key_env(&self) -> &str {
        self.llm.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    #[must_use]
    pub fn llm_max_tokens(&self) -> u32 {
        self.llm.max_tokens.unwrap_or(DEFAULT_LLM_MAX_TOKENS)
    }

    #[must_use]
    pub fn llm_temperature(&self) -> f32 {
        self.llm.temperature.unwrap_or(DEFAULT_LLM_TEMPERATURE)
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn llm_max_retries(&self) -> u32 {
        self.llm.max_retries.unwrap_or(DEFAULT_LLM_MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_accessors() {
        let config = Config::default();
        assert_eq!(config.run_timeout(), Duration::from_secs(1200));
        assert_eq!(config.workers(), 4);
        assert_eq!(config.routing_threshold(), 80);
        assert!(config.acceptance_bypass());
        assert_eq!(config.prompt(), "Feedback?");
        assert_eq!(config.llm_provider(), "openai");
        assert_eq!(config.llm_api_key_env(), "OPENAI_API_KEY");
    }

    #[test]
    fn test_default_dirs_follow_home() {
        let home = formloop_utils::paths::with_isolated_home();
        let config = Config::default();
        assert_eq!(config.cache_dir(), home.path().join("cache"));
        assert_eq!(config.sessions_dir(), home.path().join("sessions"));
    }

    #[test]
    fn test_config_source_labels() {
        assert_eq!(ConfigSource::Cli.as_str(), "cli");
        assert_eq!(ConfigSource::Default.as_str(), "default");
    }
}
