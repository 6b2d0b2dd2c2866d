use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use formloop_utils::error::ConfigError;

use super::{
    CacheConfig, CliArgs, Config, ConfigSource, EngineConfig, LlmConfig, SessionsConfig,
};

/// Keys reported by `effective_config`, all attributed to defaults until
/// a file, builder or CLI value replaces them.
pub(crate) const TRACKED_KEYS: &[&str] = &[
    "run_timeout_secs",
    "workers",
    "routing_threshold",
    "acceptance_bypass",
    "prompt",
    "cache_dir",
    "sessions_dir",
    "llm_provider",
    "llm_model",
    "llm_base_url",
    "llm_api_key_env",
    "llm_max_tokens",
    "llm_temperature",
    "llm_timeout_secs",
    "llm_budget",
    "llm_max_retries",
];

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    engine: Option<EngineConfig>,
    cache: Option<CacheConfig>,
    sessions: Option<SessionsConfig>,
    llm: Option<LlmConfig>,
}

/// Move `value` into `slot` when present and record where it came from.
fn apply<T>(
    slot: &mut Option<T>,
    value: Option<T>,
    key: &str,
    source: &ConfigSource,
    attribution: &mut HashMap<String, ConfigSource>,
) {
    if value.is_some() {
        *slot = value;
        attribution.insert(key.to_string(), source.clone());
    }
}

pub(crate) fn default_attribution() -> HashMap<String, ConfigSource> {
    TRACKED_KEYS
        .iter()
        .map(|k| (k.to_string(), ConfigSource::Default))
        .collect()
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot read current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let home = std::env::var_os("FORMLOOP_HOME").map(PathBuf::from);
        let config_path = Self::resolve_config_path(start_dir, home.as_deref(), cli_args)?;

        let mut config = Config {
            source_attribution: default_attribution(),
            ..Config::default()
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .map_err(|e| ConfigError::InvalidFile(format!("{e:#}")))?;
            tracing::debug!(path = %path.display(), "Loaded configuration file");
            config.apply_file(file_config);
            config.config_path = Some(path.clone());
        }

        config.apply_cli(cli_args);
        config.validate()?;
        Ok(config)
    }

    /// Pick the config file: explicit `--config`, then `<home>/config.toml`,
    /// then the nearest `.formloop/config.toml` above `start_dir`.
    pub(crate) fn resolve_config_path(
        start_dir: &Path,
        home: Option<&Path>,
        cli_args: &CliArgs,
    ) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(explicit) = &cli_args.config_path {
            if !explicit.is_file() {
                return Err(ConfigError::NotFound {
                    path: explicit.display().to_string(),
                });
            }
            return Ok(Some(explicit.clone()));
        }

        if let Some(home) = home {
            let candidate = home.join("config.toml");
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }

        Ok(Self::discover_config_file_from(start_dir))
    }

    /// Search upward for `.formloop/config.toml`, stopping at a repository root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current_dir = Some(start_dir);

        while let Some(dir) = current_dir {
            let config_path = dir.join(".formloop").join("config.toml");
            if config_path.is_file() {
                return Some(config_path);
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() {
                break;
            }

            current_dir = dir.parent();
        }

        None
    }

    fn load_config_file(path: &Path) -> anyhow::Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;
        Ok(config)
    }

    fn apply_file(&mut self, file: TomlConfig) {
        let source = ConfigSource::Config;
        let attr = &mut self.source_attribution;

        if let Some(engine) = file.engine {
            apply(&mut self.engine.run_timeout_secs, engine.run_timeout_secs, "run_timeout_secs", &source, attr);
            apply(&mut self.engine.workers, engine.workers, "workers", &source, attr);
            apply(&mut self.engine.routing_threshold, engine.routing_threshold, "routing_threshold", &source, attr);
            apply(&mut self.engine.acceptance_bypass, engine.acceptance_bypass, "acceptance_bypass", &source, attr);
            apply(&mut self.engine.prompt, engine.prompt, "prompt", &source, attr);
        }
        if let Some(cache) = file.cache {
            apply(&mut self.cache.dir, cache.dir, "cache_dir", &source, attr);
        }
        if let Some(sessions) = file.sessions {
            apply(&mut self.sessions.dir, sessions.dir, "sessions_dir", &source, attr);
        }
        if let Some(llm) = file.llm {
            apply(&mut self.llm.provider, llm.provider, "llm_provider", &source, attr);
            apply(&mut self.llm.model, llm.model, "llm_model", &source, attr);
            apply(&mut self.llm.base_url, llm.base_url, "llm_base_url", &source, attr);
            apply(&mut self.llm.api_key_env, llm.api_key_env, "llm_api_key_env", &source, attr);
            apply(&mut self.llm.max_tokens, llm.max_tokens, "llm_max_tokens", &source, attr);
            apply(&mut self.llm.temperature, llm.temperature, "llm_temperature", &source, attr);
            apply(&mut self.llm.timeout_secs, llm.timeout_secs, "llm_timeout_secs", &source, attr);
            apply(&mut self.llm.budget, llm.budget, "llm_budget", &source, attr);
            apply(&mut self.llm.max_retries, llm.max_retries, "llm_max_retries", &source, attr);
        }
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let source = ConfigSource::Cli;
        let attr = &mut self.source_attribution;

        apply(&mut self.engine.run_timeout_secs, cli.run_timeout_secs, "run_timeout_secs", &source, attr);
        apply(&mut self.engine.routing_threshold, cli.routing_threshold, "routing_threshold", &source, attr);
        apply(&mut self.engine.workers, cli.workers, "workers", &source, attr);
        apply(&mut self.llm.model, cli.model.clone(), "llm_model", &source, attr);
        apply(&mut self.cache.dir, cli.cache_dir.clone(), "cache_dir", &source, attr);
        apply(&mut self.sessions.dir, cli.sessions_dir.clone(), "sessions_dir", &source, attr);
    }
}
