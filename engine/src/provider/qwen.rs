use log::debug;
use reqwest::{Client, header::CONTENT_TYPE};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    config::{ProviderConfig, QwenConfig},
    error::AdapterError,
    geometry::{DEFAULT_PORTRAIT, GeometrySelector},
    normalize::{ImageNormalizer, image_dimensions},
    payload::{ImagePayload, Outcome},
    provider::{PortraitProvider, ProviderFuture, ProviderKind},
    retry::RetryPolicy,
};

pub const GENERATE_MODEL: &str = "Qwen/Qwen-Image";
pub const EDIT_MODEL: &str = "Qwen/Qwen-Image-Edit";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InferenceParams {
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub cfg: f64,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            num_inference_steps: 50,
            guidance_scale: 7.5,
            cfg: 4.0,
        }
    }
}

#[derive(Debug, Serialize)]
struct QwenRequest<'a> {
    model: &'static str,
    prompt: &'a str,
    /// Source image as data URL, edits only.
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    image_size: String,
    #[serde(flatten)]
    params: InferenceParams,
}

/// Qwen-Image endpoints. They answer with an image URL that is fetched and
/// normalized to PNG, plus an optional seed.
#[derive(Debug, Clone)]
pub struct QwenProvider {
    config: QwenConfig,
    client: Client,
    normalizer: ImageNormalizer,
    retry: RetryPolicy,
    geometry: GeometrySelector,
    params: InferenceParams,
}

impl QwenProvider {
    pub fn new(config: QwenConfig, client: Client, normalizer: ImageNormalizer) -> Self {
        Self {
            config,
            client,
            normalizer,
            retry: RetryPolicy::default(),
            geometry: GeometrySelector::default(),
            params: InferenceParams::default(),
        }
    }

    pub fn from_config(config: &ProviderConfig, client: Client) -> Self {
        let normalizer = ImageNormalizer::new(client.clone(), config.image_proxy.clone());
        Self::new(config.qwen.clone(), client, normalizer)
            .with_retry(RetryPolicy::new(config.retry_delay()))
            .with_geometry(GeometrySelector::new(config.orientation_penalty))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_geometry(mut self, geometry: GeometrySelector) -> Self {
        self.geometry = geometry;
        self
    }

    async fn post_json(&self, url: &str, body: &QwenRequest<'_>) -> Result<Value, AdapterError> {
        let client = &self.client;
        let api_key = self.config.api_key.as_deref();

        self.retry
            .run(move || async move {
                let mut request = client.post(url).json(body);
                if let Some(key) = api_key {
                    request = request.bearer_auth(key);
                }
                let resp = request
                    .send()
                    .await
                    .map_err(|e| AdapterError::from_request("Qwen", e))?;

                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AdapterError::application("Qwen", status, &body));
                }

                let is_json = resp
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|ct| ct.contains("application/json"));
                let text = resp
                    .text()
                    .await
                    .map_err(|e| AdapterError::from_request("Qwen", e))?;

                if is_json {
                    serde_json::from_str(&text).map_err(|e| {
                        AdapterError::ResponseShape(format!("Qwen response is not valid JSON: {e}"))
                    })
                } else {
                    Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text })))
                }
            })
            .await
    }

    async fn request_generate(&self, prompt: &str) -> Result<Value, AdapterError> {
        let endpoint = self.config.generate_endpoint.as_deref().ok_or_else(|| {
            AdapterError::Configuration("QWEN_IMAGE_API_GENERATE is not configured".into())
        })?;

        let body = QwenRequest {
            model: GENERATE_MODEL,
            prompt,
            image: None,
            image_size: DEFAULT_PORTRAIT.to_string(),
            params: self.params,
        };

        let data = self.post_json(endpoint, &body).await?;
        debug!("Qwen generate response: {data:#}");
        Ok(data)
    }

    async fn request_edit(&self, image: &ImagePayload, prompt: &str) -> Result<Value, AdapterError> {
        let endpoint = self.config.edit_endpoint.as_deref().ok_or_else(|| {
            AdapterError::Configuration("QWEN_IMAGE_API_EDIT is not configured".into())
        })?;

        let (width, height) = image_dimensions(image);
        let size = self.geometry.select(width.into(), height.into());
        debug!("Source image is {width}x{height}, requesting {size}");

        let body = QwenRequest {
            model: EDIT_MODEL,
            prompt,
            image: Some(image.to_data_url()),
            image_size: size.to_string(),
            params: self.params,
        };

        let data = self.post_json(endpoint, &body).await?;
        debug!("Qwen edit response: {data:#}");
        Ok(data)
    }

    /// The seed is taken from the response before the image is resolved, so it
    /// is reported even when the image URL is missing or can't be fetched.
    async fn finish(
        &self,
        response: Result<Value, AdapterError>,
        image_url: fn(&Value) -> Option<&str>,
        missing: &str,
    ) -> Outcome {
        let data = match response {
            Ok(data) => data,
            Err(err) => return Outcome::failed(err),
        };
        let seed = extract_seed(&data);

        let image = match image_url(&data) {
            Some(url) => self.normalizer.normalize(url).await,
            None => Err(AdapterError::ResponseShape(missing.into())),
        };

        Outcome { seed, image }
    }
}

impl PortraitProvider for QwenProvider {
    fn generate<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            let response = self.request_generate(prompt).await;
            self.finish(
                response,
                generated_image_url,
                "Qwen generate response missing image_url or images[0].url",
            )
            .await
        })
    }

    fn edit<'a>(&'a self, image: &'a ImagePayload, prompt: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            let response = self.request_edit(image, prompt).await;
            self.finish(response, listed_image_url, "Qwen edit response missing image URL")
                .await
        })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Qwen
    }
}

/// Strings are kept verbatim, any other value is rendered as JSON.
fn extract_seed(data: &Value) -> Option<String> {
    match data.get("seed")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn generated_image_url(data: &Value) -> Option<&str> {
    data.get("image_url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .or_else(|| listed_image_url(data))
}

/// `images[0]` or `data[0]`, each either a URL or an object with a `url` field.
fn listed_image_url(data: &Value) -> Option<&str> {
    let first_url = |key: &str| {
        let entry = data.get(key)?.get(0)?;
        entry
            .as_str()
            .or_else(|| entry.get("url").and_then(Value::as_str))
            .filter(|url| !url.is_empty())
    };
    first_url("images").or_else(|| first_url("data"))
}
