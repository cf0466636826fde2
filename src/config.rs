// Tue Jan 13 2026 - Alex

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("Failed to write config {path}: {source}")]
    Write { path: String, source: std::io::Error },
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Strip `\n` from captured module source before patching.
    pub strip_newlines: bool,
    /// What `$self` in a replacement expands to; `{owner}` becomes the
    /// JSON-quoted extension name.
    pub self_reference_template: String,
    pub slow_patch_threshold_ms: u64,
    /// Entry points inside the first module containing this are required
    /// only after scanning settles.
    pub deferred_entry_marker: String,
    pub worker_asset_marker: String,
    /// Zero means yield to the scheduler instead of sleeping.
    pub poll_interval_ms: u64,
    pub max_poll_cycles: usize,
    pub settle_cycles: usize,
    pub criteria_truncation: usize,
    pub export_key_limit: usize,
    pub record_history: bool,
    pub sentinel: String,
    pub report_title: String,
    pub webhook: Option<WebhookConfig>,
    pub ignored_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_webhook_username")]
    pub username: String,
}

fn default_webhook_username() -> String {
    "Bundle Interceptor Reporter".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strip_newlines: true,
            self_reference_template: "BundleInterceptor.extensions[{owner}]".to_string(),
            slow_patch_threshold_ms: 5,
            deferred_entry_marker: ".cssDebuggingEnabled&&".to_string(),
            worker_asset_marker: "importScripts(".to_string(),
            poll_interval_ms: 0,
            max_poll_cycles: 10_000,
            settle_cycles: 1,
            criteria_truncation: 200,
            export_key_limit: 3,
            record_history: true,
            sentinel: "[BundleInterceptor]".to_string(),
            report_title: "Bundle Interceptor Report".to_string(),
            webhook: None,
            ignored_errors: Vec::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strip_newlines(mut self, strip: bool) -> Self {
        self.strip_newlines = strip;
        self
    }

    pub fn with_slow_patch_threshold_ms(mut self, ms: u64) -> Self {
        self.slow_patch_threshold_ms = ms;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_max_poll_cycles(mut self, cycles: usize) -> Self {
        self.max_poll_cycles = cycles;
        self
    }

    pub fn with_deferred_entry_marker(mut self, marker: impl Into<String>) -> Self {
        self.deferred_entry_marker = marker.into();
        self
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_webhook(mut self, webhook: WebhookConfig) -> Self {
        self.webhook = Some(webhook);
        self
    }

    pub fn with_ignored_error(mut self, pattern: impl Into<String>) -> Self {
        self.ignored_errors.push(pattern.into());
        self
    }

    pub fn self_reference(&self, owner: &str) -> String {
        let quoted = serde_json::to_string(owner).unwrap_or_else(|_| format!("\"{}\"", owner));
        self.self_reference_template.replace("{owner}", &quoted)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sentinel.trim().is_empty() {
            return Err(ConfigError::Invalid("sentinel must not be empty".to_string()));
        }
        if self.sentinel.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid("sentinel must not contain whitespace".to_string()));
        }
        if self.max_poll_cycles == 0 {
            return Err(ConfigError::Invalid("max_poll_cycles must be greater than 0".to_string()));
        }
        if self.settle_cycles == 0 {
            return Err(ConfigError::Invalid("settle_cycles must be greater than 0".to_string()));
        }
        if self.criteria_truncation < 8 {
            return Err(ConfigError::Invalid("criteria_truncation must be at least 8".to_string()));
        }
        if self.deferred_entry_marker.is_empty() || self.worker_asset_marker.is_empty() {
            return Err(ConfigError::Invalid("markers must not be empty".to_string()));
        }
        if let Some(webhook) = &self.webhook {
            if !webhook.url.starts_with("http://") && !webhook.url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!("webhook url {} is not http(s)", webhook.url)));
            }
        }
        for pattern in &self.ignored_errors {
            regex::Regex::new(pattern)
                .map_err(|e| ConfigError::Invalid(format!("ignored error pattern {}: {}", pattern, e)))?;
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_self_reference_quotes_owner() {
        let config = Config::default();
        assert_eq!(config.self_reference("Demo"), "BundleInterceptor.extensions[\"Demo\"]");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::default().with_sentinel("").validate().is_err());
        assert!(Config::default().with_max_poll_cycles(0).validate().is_err());
        assert!(Config::default().with_ignored_error("(unclosed").validate().is_err());
        let hook = WebhookConfig {
            url: "ftp://example".to_string(),
            secret: None,
            username: default_webhook_username(),
        };
        assert!(Config::default().with_webhook(hook).validate().is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config::default().with_poll_interval_ms(3).with_ignored_error("KeybindStore");
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"slow_patch_threshold_ms": 50}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.slow_patch_threshold_ms, 50);
        assert!(config.strip_newlines);
    }
}
