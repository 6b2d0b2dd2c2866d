use formloop_utils::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values.
    ///
    /// A single problem is reported as `InvalidValue`; several are collected
    /// into `ValidationFailed`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems: Vec<(&str, String)> = Vec::new();

        if self.engine.run_timeout_secs == Some(0) {
            problems.push(("run_timeout_secs", "must be greater than 0".to_string()));
        }
        if self.engine.workers == Some(0) {
            problems.push(("workers", "must be greater than 0".to_string()));
        }
        if let Some(workers) = self.engine.workers
            && workers > 256
        {
            problems.push(("workers", "exceeds maximum of 256".to_string()));
        }
        if let Some(threshold) = self.engine.routing_threshold
            && threshold > 100
        {
            problems.push((
                "routing_threshold",
                format!("{threshold} is outside 0-100"),
            ));
        }
        if let Some(prompt) = &self.engine.prompt
            && prompt.trim().is_empty()
        {
            problems.push(("prompt", "must not be blank".to_string()));
        }
        if let Some(temperature) = self.llm.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            problems.push(("llm_temperature", format!("{temperature} is outside 0.0-2.0")));
        }
        if self.llm.max_tokens == Some(0) {
            problems.push(("llm_max_tokens", "must be greater than 0".to_string()));
        }
        if self.llm.timeout_secs == Some(0) {
            problems.push(("llm_timeout_secs", "must be greater than 0".to_string()));
        }
        if let Some(base_url) = &self.llm.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            problems.push(("llm_base_url", format!("'{base_url}' is not an http(s) URL")));
        }

        match problems.len() {
            0 => Ok(()),
            1 => {
                let (key, value) = problems.remove(0);
                Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                })
            }
            n => Err(ConfigError::ValidationFailed {
                errors: problems
                    .into_iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect(),
                error_count: n,
            }),
        }
    }
}
