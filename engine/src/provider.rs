use std::pin::Pin;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    ProviderBox,
    config::ProviderConfig,
    payload::{ImagePayload, Outcome},
};

pub mod google;
pub use google::GoogleProvider;

pub mod qwen;
pub use qwen::QwenProvider;

#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    EnumString,
    clap::ValueEnum,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    Default,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Imagen for generation, Gemini for edits. Returns inline image data.
    #[default]
    Google,
    /// Qwen-Image endpoints. Return an image URL.
    Qwen,
}

impl ProviderKind {
    pub fn make(&self, config: &ProviderConfig) -> ProviderBox {
        let client = reqwest::Client::new();
        match self {
            ProviderKind::Google => Box::new(GoogleProvider::new(config.google.clone(), client)),
            ProviderKind::Qwen => Box::new(QwenProvider::from_config(config, client)),
        }
    }
}

pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Outcome> + Send + 'a>>;

/// A backend that can paint a portrait from a prompt or rework an existing one.
pub trait PortraitProvider {
    fn generate<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a>;

    fn edit<'a>(&'a self, image: &'a ImagePayload, prompt: &'a str) -> ProviderFuture<'a>;

    fn kind(&self) -> ProviderKind;
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(ProviderKind::from_str("qwen").unwrap(), ProviderKind::Qwen);
        assert_eq!(ProviderKind::from_str("Google").unwrap(), ProviderKind::Google);
        assert!(ProviderKind::from_str("dalle").is_err());
        assert_eq!(ProviderKind::Qwen.to_string(), "qwen");
    }

    #[test]
    fn make_picks_the_configured_backend() {
        let config = ProviderConfig::default();
        assert_eq!(ProviderKind::Google.make(&config).kind(), ProviderKind::Google);
        assert_eq!(ProviderKind::Qwen.make(&config).kind(), ProviderKind::Qwen);
    }
}
