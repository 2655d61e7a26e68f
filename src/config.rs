use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-pro";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for the generative backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// `None` when no API key is set; the engine then runs rule-based only.
    pub completion: Option<CompletionConfig>,
    pub timeout: Duration,
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = match lookup("COMPLETION_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .with_context(|| {
                    format!("COMPLETION_TIMEOUT_SECS must be a positive integer, got {raw:?}")
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let timeout = Duration::from_secs(timeout_secs);

        let completion = lookup("GOOGLE_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(|api_key| CompletionConfig {
                api_key,
                endpoint: lookup("COMPLETION_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                model: lookup("COMPLETION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout,
            });

        Ok(Self {
            completion,
            timeout,
        })
    }
}

pub fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance for storage commands")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_key_disables_completion() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.completion.is_none());
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn blank_key_disables_completion() {
        let config = EngineConfig::from_lookup(lookup(&[("GOOGLE_API_KEY", "  ")])).unwrap();
        assert!(config.completion.is_none());
    }

    #[test]
    fn key_and_overrides_are_read() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "secret"),
            ("COMPLETION_MODEL", "gemini-1.5-flash"),
            ("COMPLETION_TIMEOUT_SECS", "12"),
        ]))
        .unwrap();
        let completion = config.completion.unwrap();
        assert_eq!(completion.api_key, "secret");
        assert_eq!(completion.model, "gemini-1.5-flash");
        assert_eq!(completion.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(completion.timeout, Duration::from_secs(12));
    }

    #[test]
    fn bad_timeout_is_an_error() {
        assert!(EngineConfig::from_lookup(lookup(&[("COMPLETION_TIMEOUT_SECS", "0")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("COMPLETION_TIMEOUT_SECS", "soon")])).is_err());
    }
}
