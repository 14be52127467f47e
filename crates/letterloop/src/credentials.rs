//! Credential loading.
//!
//! The key file holds `API_KEY,MODEL_NAME` on one line. Environment variables
//! and the config file can override either half.

use anyhow::{Context, Result};
use std::path::Path;

use letterloop_client::Credentials;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "GEMINI_MODEL";

/// Split key file contents into `(api_key, model)`.
///
/// Strips a UTF-8 byte order mark, surrounding whitespace and any quote
/// characters. Missing halves come back empty.
pub fn parse_key_file(content: &str) -> (String, String) {
    let content = content.trim_start_matches('\u{feff}').trim();
    if content.is_empty() {
        return (String::new(), String::new());
    }

    let mut parts = content.split(',').map(clean);
    let api_key = parts.next().unwrap_or_default();
    let model = parts.next().unwrap_or_default();
    (api_key, model)
}

fn clean(part: &str) -> String {
    part.replace(['"', '\''], "").trim().to_string()
}

/// Every place a credential half can come from
#[derive(Debug, Default)]
pub struct CredentialSources {
    pub key_file: Option<String>,
    pub env_key: Option<String>,
    pub env_model: Option<String>,
    pub config_model: Option<String>,
    pub cli_model: Option<String>,
}

impl CredentialSources {
    pub fn gather(key_file: &Path, config_model: Option<&str>, cli_model: Option<&str>) -> Result<Self> {
        let key_file = if key_file.exists() {
            Some(
                std::fs::read_to_string(key_file)
                    .with_context(|| format!("Failed to read {}", key_file.display()))?,
            )
        } else {
            None
        };

        Ok(Self {
            key_file,
            env_key: std::env::var(API_KEY_ENV).ok(),
            env_model: std::env::var(MODEL_ENV).ok(),
            config_model: config_model.map(String::from),
            cli_model: cli_model.map(String::from),
        })
    }

    /// Key priority: env > key file.
    /// Model priority: CLI > env > config > key file.
    pub fn resolve(&self) -> Credentials {
        let (file_key, file_model) = self
            .key_file
            .as_deref()
            .map(parse_key_file)
            .unwrap_or_default();

        let api_key = non_empty(self.env_key.as_deref()).unwrap_or(file_key);
        let model = non_empty(self.cli_model.as_deref())
            .or_else(|| non_empty(self.env_model.as_deref()))
            .or_else(|| non_empty(self.config_model.as_deref()))
            .unwrap_or(file_model);

        Credentials::new(api_key, model)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(clean).filter(|v| !v.is_empty())
}
