use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::storage::KeyValueStore;
use crate::config::{
    DEFAULT_ENDPOINT, DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MODEL, DEFAULT_USER_ID,
    DEFAULT_WELCOME_MESSAGE, ENV_ENDPOINT, ENV_MODEL, SETTINGS_KEY,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub endpoint: String,
    pub model: String,
    pub user_id: String,
    pub stream_responses: bool,
    /// Ceiling on the summed character length of the stored conversation.
    pub max_context_chars: usize,
    pub welcome_message: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            stream_responses: true,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl AppSettings {
    /// Apply overrides from the environment, e.g. `CHATTERBOX_MODEL`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            self.model = model;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid endpoint URL: {}", self.endpoint))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Endpoint must use http or https: {}", self.endpoint);
        }
        if self.model.trim().is_empty() {
            bail!("Model id must not be empty");
        }
        if self.max_context_chars == 0 {
            bail!("max_context_chars must be greater than zero");
        }
        Ok(())
    }
}

pub struct SettingsService;

impl SettingsService {
    pub fn load(store: &dyn KeyValueStore) -> AppSettings {
        match store.get(SETTINGS_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse settings, using defaults: {}", e);
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    pub fn save(store: &dyn KeyValueStore, settings: &AppSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        store.set(SETTINGS_KEY, &json)
    }
}
