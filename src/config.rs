//! # Configuration Module
//!
//! Application-level settings for the dispatch core, loaded from YAML.
//!
//! ## Example
//!
//! ```yaml
//! default_content_type: text/html; charset=utf-8
//! max_body_size: 0x100000
//! match_mode: exclusive
//! method_not_allowed: true
//! error_message: Something went wrong.
//! ```
//!
//! Every field is optional; missing ones take the values of [`AppConfig::default`].
//!
//! ## Environment Variables
//!
//! [`AppConfig::with_env_overrides`] applies, on top of the file:
//!
//! - `BRRTD_MAX_BODY_SIZE`: decimal (`1048576`) or hexadecimal (`0x100000`)
//! - `BRRTD_DEFAULT_CONTENT_TYPE`
//!
//! Unparseable values are ignored with a warning.

use std::env;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::router::MatchMode;

/// Default body size limit (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 0x10_0000;

/// Errors raised while reading configuration text.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("default_content_type must not be empty")]
    EmptyContentType,
    #[error("max_body_size must be greater than zero")]
    ZeroBodySize,
}

/// Settings shared by every dispatch of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Content type applied to responses that carry none
    pub default_content_type: String,
    /// Largest request body accepted, in bytes; larger ones get 413
    #[serde(deserialize_with = "deserialize_size")]
    pub max_body_size: usize,
    /// Prefix (default) or whole-path route matching
    pub match_mode: MatchMode,
    /// Answer 405 with `Allow` instead of 404 when only the verb differs
    pub method_not_allowed: bool,
    /// Body of the fallback 500 response
    pub error_message: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_content_type: "text/plain; charset=utf-8".to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            match_mode: MatchMode::Prefix,
            method_not_allowed: false,
            error_message: "Internal Server Error".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse and validate YAML configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed YAML or invalid values.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // an empty document deserializes to unit, not to a map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or its content is invalid.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Apply `BRRTD_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup("BRRTD_MAX_BODY_SIZE") {
            match parse_size(&raw) {
                Some(size) if size > 0 => self.max_body_size = size,
                _ => warn!(value = %raw, "Ignoring invalid BRRTD_MAX_BODY_SIZE"),
            }
        }
        if let Some(content_type) = lookup("BRRTD_DEFAULT_CONTENT_TYPE") {
            if content_type.trim().is_empty() {
                warn!("Ignoring empty BRRTD_DEFAULT_CONTENT_TYPE");
            } else {
                self.default_content_type = content_type;
            }
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_content_type.trim().is_empty() {
            return Err(ConfigError::EmptyContentType);
        }
        if self.max_body_size == 0 {
            return Err(ConfigError::ZeroBodySize);
        }
        Ok(())
    }
}

/// Parse a byte count written in decimal or `0x` hexadecimal.
fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(usize),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => parse_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid size '{s}'"))),
    }
}
