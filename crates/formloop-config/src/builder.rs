use std::path::PathBuf;
use std::time::Duration;

use formloop_utils::error::ConfigError;

use super::discovery::default_attribution;
use super::{Config, ConfigSource};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// ```rust
    /// use formloop_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .run_timeout(Duration::from_secs(300))
    ///     .workers(2)
    ///     .routing_threshold(75)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.workers(), 2);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent construction of a [`Config`] without files or environment.
///
/// All values set via the builder are attributed to
/// [`ConfigSource::Programmatic`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config {
                source_attribution: default_attribution(),
                ..Config::default()
            },
        }
    }

    fn mark(&mut self, key: &str) {
        self.config
            .source_attribution
            .insert(key.to_string(), ConfigSource::Programmatic);
    }

    #[must_use]
    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.config.engine.run_timeout_secs = Some(timeout.as_secs());
        self.mark("run_timeout_secs");
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.engine.workers = Some(workers);
        self.mark("workers");
        self
    }

    #[must_use]
    pub fn routing_threshold(mut self, threshold: u8) -> Self {
        self.config.engine.routing_threshold = Some(threshold);
        self.mark("routing_threshold");
        self
    }

    #[must_use]
    pub fn acceptance_bypass(mut self, enabled: bool) -> Self {
        self.config.engine.acceptance_bypass = Some(enabled);
        self.mark("acceptance_bypass");
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.engine.prompt = Some(prompt.into());
        self.mark("prompt");
        self
    }

    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache.dir = Some(dir.into());
        self.mark("cache_dir");
        self
    }

    #[must_use]
    pub fn sessions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.sessions.dir = Some(dir.into());
        self.mark("sessions_dir");
        self
    }

    #[must_use]
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = Some(model.into());
        self.mark("llm_model");
        self
    }

    #[must_use]
    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm.base_url = Some(url.into());
        self.mark("llm_base_url");
        self
    }

    #[must_use]
    pub fn llm_budget(mut self, budget: u32) -> Self {
        self.config.llm.budget = Some(budget);
        self.mark("llm_budget");
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_attributes_programmatic() {
        let config = Config::builder()
            .workers(2)
            .acceptance_bypass(false)
            .prompt("Anything to change?")
            .build()
            .unwrap();

        assert_eq!(config.workers(), 2);
        assert!(!config.acceptance_bypass());
        assert_eq!(config.prompt(), "Anything to change?");
        assert_eq!(
            config.source_attribution["workers"],
            ConfigSource::Programmatic
        );
        assert_eq!(
            config.source_attribution["routing_threshold"],
            ConfigSource::Default
        );
    }

    #[test]
    fn test_builder_validates() {
        let err = Config::builder().routing_threshold(150).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
