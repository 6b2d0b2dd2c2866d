use std::collections::HashMap;

use super::{Config, ConfigSource};

impl Config {
    fn source_label(&self, key: &str) -> String {
        self.source_attribution
            .get(key)
            .unwrap_or(&ConfigSource::Default)
            .as_str()
            .to_string()
    }

    /// Get effective configuration as key -> (value, source) pairs
    #[must_use]
    pub fn effective_config(&self) -> HashMap<String, (String, String)> {
        let values: Vec<(&str, String)> = vec![
            ("run_timeout_secs", self.run_timeout().as_secs().to_string()),
            ("workers", self.workers().to_string()),
            ("routing_threshold", self.routing_threshold().to_string()),
            ("acceptance_bypass", self.acceptance_bypass().to_string()),
            ("prompt", self.prompt().to_string()),
            ("cache_dir", self.cache_dir().display().to_string()),
            ("sessions_dir", self.sessions_dir().display().to_string()),
            ("llm_provider", self.llm_provider().to_string()),
            ("llm_model", self.llm_model().to_string()),
            ("llm_base_url", self.llm_base_url().to_string()),
            ("llm_api_key_env", self.llm_api_key_env().to_string()),
            ("llm_max_tokens", self.llm_max_tokens().to_string()),
            ("llm_temperature", self.llm_temperature().to_string()),
            ("llm_timeout_secs", self.llm_timeout().as_secs().to_string()),
            (
                "llm_budget",
                self.llm
                    .budget
                    .map_or_else(|| "unlimited".to_string(), |b| b.to_string()),
            ),
            ("llm_max_retries", self.llm_max_retries().to_string()),
        ];

        values
            .into_iter()
            .map(|(key, value)| (key.to_string(), (value, self.source_label(key))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::TRACKED_KEYS;

    #[test]
    fn test_effective_config_covers_tracked_keys() {
        let effective = Config::default().effective_config();
        for key in TRACKED_KEYS {
            let (_, source) = effective
                .get(*key)
                .unwrap_or_else(|| panic!("missing {key}"));
            assert_eq!(source, "default");
        }
        assert_eq!(effective["llm_budget"].0, "unlimited");
        assert_eq!(effective["routing_threshold"].0, "80");
    }
}
