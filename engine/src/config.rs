use std::{env, fs, path::Path, path::PathBuf, str::FromStr, time::Duration};

use color_eyre::{Result, eyre::eyre};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{geometry::DEFAULT_ORIENTATION_PENALTY, provider::ProviderKind, retry::DEFAULT_RETRY_DELAY};

pub const APP_NAME: &str = "Portrait Studio";
pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Read once at startup. Nothing is validated here, a missing endpoint or
/// key only fails the call that needs it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub active_provider: ProviderKind,
    pub google: GoogleConfig,
    pub qwen: QwenConfig,
    /// Same-origin proxy endpoint used to fetch provider image URLs.
    pub image_proxy: Option<String>,
    pub retry_delay_ms: u64,
    pub orientation_penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GoogleConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QwenConfig {
    pub generate_endpoint: Option<String>,
    pub edit_endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            active_provider: ProviderKind::default(),
            google: GoogleConfig::default(),
            qwen: QwenConfig::default(),
            image_proxy: None,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            orientation_penalty: DEFAULT_ORIENTATION_PENALTY,
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: GOOGLE_BASE_URL.into(),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key/value source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(name) = get("IMAGE_PROVIDER") {
            cfg.active_provider = ProviderKind::from_str(name.trim()).unwrap_or_else(|_| {
                warn!("Unknown IMAGE_PROVIDER {name:?}, using {}", ProviderKind::default());
                ProviderKind::default()
            });
        }

        cfg.google.api_key = get("GEMINI_API_KEY").or_else(|| get("API_KEY"));
        if let Some(base) = get("GEMINI_BASE_URL") {
            cfg.google.base_url = base;
        }

        cfg.qwen = QwenConfig {
            generate_endpoint: get("QWEN_IMAGE_API_GENERATE"),
            edit_endpoint: get("QWEN_IMAGE_API_EDIT"),
            api_key: get("QWEN_API_KEY"),
        };
        cfg.image_proxy = get("IMAGE_PROXY_URL");

        cfg
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = fs::read_to_string(path)?;
        Ok(ron::from_str(&src)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        Ok(fs::write(path, ron::to_string(self)?)?)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(eyre!("Couldn't find config dir"))?
        .join(APP_NAME)
        .join("config.ron"))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use tempfile::NamedTempFile;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_google() {
        let cfg = ProviderConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.active_provider, ProviderKind::Google);
        assert_eq!(cfg.retry_delay(), DEFAULT_RETRY_DELAY);
        assert_eq!(cfg.google.base_url, GOOGLE_BASE_URL);
        assert_eq!(cfg.qwen, QwenConfig::default());
    }

    #[test]
    fn reads_qwen_settings() {
        let cfg = ProviderConfig::from_lookup(lookup(&[
            ("IMAGE_PROVIDER", "QWEN"),
            ("QWEN_IMAGE_API_GENERATE", "http://qwen/generate"),
            ("QWEN_IMAGE_API_EDIT", ""),
            ("QWEN_API_KEY", "secret"),
            ("API_KEY", "google-key"),
        ]));
        assert_eq!(cfg.active_provider, ProviderKind::Qwen);
        assert_eq!(cfg.qwen.generate_endpoint.as_deref(), Some("http://qwen/generate"));
        assert_eq!(cfg.qwen.edit_endpoint, None);
        assert_eq!(cfg.qwen.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.google.api_key.as_deref(), Some("google-key"));
    }

    #[test]
    fn unknown_provider_falls_back() {
        let cfg = ProviderConfig::from_lookup(lookup(&[("IMAGE_PROVIDER", "midjourney")]));
        assert_eq!(cfg.active_provider, ProviderKind::Google);
    }

    #[test]
    fn ron_round_trip() -> Result<()> {
        let tmpfile = NamedTempFile::new()?;
        let mut cfg = ProviderConfig::default();
        cfg.active_provider = ProviderKind::Qwen;
        cfg.qwen.edit_endpoint = Some("http://qwen/edit".into());
        cfg.save(tmpfile.path())?;

        assert_eq!(ProviderConfig::load(tmpfile.path())?, cfg);
        Ok(())
    }

    #[test]
    fn partial_ron_uses_defaults() {
        let cfg: ProviderConfig = ron::from_str("(active_provider: qwen, retry_delay_ms: 10)").unwrap();
        assert_eq!(cfg.active_provider, ProviderKind::Qwen);
        assert_eq!(cfg.retry_delay(), Duration::from_millis(10));
        assert_eq!(cfg.orientation_penalty, DEFAULT_ORIENTATION_PENALTY);
    }
}
