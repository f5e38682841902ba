use std::sync::Mutex;

use log::{error, info};

use crate::{
    ProviderBox,
    config::ProviderConfig,
    error::ProviderError,
    payload::{Generated, GenerationRequest, ImagePayload, Outcome},
    provider::ProviderKind,
};

/// Entry point for the front end. Forwards to the provider chosen at
/// construction and flattens every failure into a [`ProviderError`].
pub struct PortraitService {
    provider: ProviderBox,
    /// Seed of the most recent call, whichever request it belonged to.
    last_seed: Mutex<Option<String>>,
}

impl PortraitService {
    pub fn new(provider: ProviderBox) -> Self {
        Self {
            provider,
            last_seed: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        info!("Using image provider {}", config.active_provider);
        Self::new(config.active_provider.make(config))
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub async fn generate_portrait(&self, prompt: &str) -> Result<Generated, ProviderError> {
        let outcome = self.provider.generate(prompt).await;
        self.finish("generate", outcome)
    }

    pub async fn edit_portrait(
        &self,
        image: &ImagePayload,
        prompt: &str,
    ) -> Result<Generated, ProviderError> {
        let outcome = self.provider.edit(image, prompt).await;
        self.finish("edit", outcome)
    }

    /// Generates or edits depending on whether the request carries a source image.
    pub async fn run(&self, request: &GenerationRequest) -> Result<Generated, ProviderError> {
        match &request.source_image {
            Some(image) => self.edit_portrait(image, &request.prompt).await,
            None => self.generate_portrait(&request.prompt).await,
        }
    }

    /// Concurrent calls overwrite each other here. Use [`Generated::seed`]
    /// when the seed has to belong to a specific request.
    pub fn last_seed(&self) -> Option<String> {
        self.last_seed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stores whatever seed the backend reported, even if a later step failed.
    fn finish(&self, operation: &str, outcome: Outcome) -> Result<Generated, ProviderError> {
        *self
            .last_seed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = outcome.seed.clone();

        outcome.into_result().map_err(|err| {
            let context = format!("{}.{operation}", self.provider.kind());
            error!("Error in {context}: {err:?}");
            ProviderError::new(context, &err)
        })
    }
}
