use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    config::GoogleConfig,
    error::AdapterError,
    payload::{ImagePayload, Outcome, PNG_MIME},
    provider::{PortraitProvider, ProviderFuture, ProviderKind},
    retry::RetryPolicy,
};

pub const GENERATE_MODEL: &str = "imagen-4.0-generate-001";
pub const EDIT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const ASPECT_RATIO: &str = "3:4";

const NO_IMAGE_GENERATED: &str =
    "No image was generated. The model may have refused the request due to safety policies.";
const NO_IMAGE_EDITED: &str =
    "No image was returned from the edit request. The model may have refused the request.";

/// Imagen for text-to-image, Gemini image preview for edits. Both answer with
/// inline Base64 data, so nothing needs to be fetched. Never reports a seed.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    config: GoogleConfig,
    client: Client,
    retry: RetryPolicy,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig, client: Client) -> Self {
        Self {
            config,
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn api_key(&self) -> Result<&str, AdapterError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::Configuration("GEMINI_API_KEY is not configured".into()))
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        model: &str,
        method: &str,
        body: &B,
    ) -> Result<R, AdapterError> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/models/{model}:{method}",
            self.config.base_url.trim_end_matches('/')
        );
        let url = url.as_str();
        let client = &self.client;

        self.retry
            .run(move || async move {
                let resp = client
                    .post(url)
                    .header("x-goog-api-key", api_key)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| AdapterError::from_request("Google", e))?;

                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AdapterError::application("Google", status, &body));
                }
                let text = resp
                    .text()
                    .await
                    .map_err(|e| AdapterError::from_request("Google", e))?;

                serde_json::from_str(&text).map_err(|e| {
                    AdapterError::ResponseShape(format!("Unexpected Google response: {e}"))
                })
            })
            .await
    }

    async fn generate_impl(&self, prompt: &str) -> Result<ImagePayload, AdapterError> {
        let body = PredictRequest {
            instances: vec![PredictInstance { prompt }],
            parameters: PredictParameters {
                sample_count: 1,
                output_mime_type: PNG_MIME,
                aspect_ratio: ASPECT_RATIO,
            },
        };

        let resp: PredictResponse = self.post(GENERATE_MODEL, "predict", &body).await?;
        let prediction = resp
            .predictions
            .into_iter()
            .find_map(|p| p.bytes_base64_encoded.map(|data| (data, p.mime_type)))
            .ok_or_else(|| AdapterError::NoImageReturned(NO_IMAGE_GENERATED.into()))?;

        let (data, mime_type) = prediction;
        Ok(ImagePayload::new(
            data,
            mime_type.unwrap_or_else(|| PNG_MIME.into()),
        ))
    }

    async fn edit_impl(&self, image: &ImagePayload, prompt: &str) -> Result<ImagePayload, AdapterError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        inline_data: Some(InlineData {
                            mime_type: image.mime_type.clone(),
                            data: image.data.clone(),
                        }),
                        text: None,
                    },
                    Part {
                        inline_data: None,
                        text: Some(prompt.to_string()),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
            },
        };

        let resp: GenerateContentResponse = self.post(EDIT_MODEL, "generateContent", &body).await?;
        first_inline_image(resp)
    }
}

impl PortraitProvider for GoogleProvider {
    fn generate<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move { Outcome::from(self.generate_impl(prompt).await) })
    }

    fn edit<'a>(&'a self, image: &'a ImagePayload, prompt: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move { Outcome::from(self.edit_impl(image, prompt).await) })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }
}

/// Returns the first inline image of the first candidate. Text parts seen on
/// the way are collected for the error message if no image follows.
fn first_inline_image(resp: GenerateContentResponse) -> Result<ImagePayload, AdapterError> {
    let parts = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let mut text = String::new();
    for part in parts {
        if let Some(inline) = part.inline_data {
            return Ok(ImagePayload::new(inline.data, inline.mime_type));
        }
        if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    debug!("Gemini edit returned no image, text: {text:?}");
    Err(AdapterError::NoImageReturned(if text.is_empty() {
        NO_IMAGE_EDITED.into()
    } else {
        format!("Model returned text instead of an image: \"{text}\"")
    }))
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    output_mime_type: &'static str,
    aspect_ratio: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[cfg(test)]
mod test {
    use expect_test::expect;
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn predict_request_serialization() {
        let body = PredictRequest {
            instances: vec![PredictInstance { prompt: "a smiling face" }],
            parameters: PredictParameters {
                sample_count: 1,
                output_mime_type: PNG_MIME,
                aspect_ratio: ASPECT_RATIO,
            },
        };

        let expect = expect![[r#"{"instances":[{"prompt":"a smiling face"}],"parameters":{"sampleCount":1,"outputMimeType":"image/png","aspectRatio":"3:4"}}"#]];
        expect.assert_eq(&serde_json::to_string(&body).unwrap());
    }

    #[test]
    fn first_image_part_wins() {
        let resp = parse(json!({
            "candidates": [{"content": {"parts": [
                {"text": "Here you go"},
                {"inlineData": {"mimeType": "image/png", "data": "Zmlyc3Q="}},
                {"inlineData": {"mimeType": "image/jpeg", "data": "c2Vjb25k"}},
            ]}}]
        }));
        let image = first_inline_image(resp).unwrap();
        assert_eq!(image, ImagePayload::new("Zmlyc3Q=", "image/png"));
    }

    #[test]
    fn text_only_answer_is_reported() {
        let resp = parse(json!({
            "candidates": [{"content": {"parts": [{"text": "blocked by safety filter"}]}}]
        }));
        let err = first_inline_image(resp).unwrap_err();
        assert!(matches!(err, AdapterError::NoImageReturned(_)));
        assert_eq!(
            err.to_string(),
            "Model returned text instead of an image: \"blocked by safety filter\""
        );
    }

    #[test]
    fn empty_answer_gets_generic_message() {
        let err = first_inline_image(parse(json!({"candidates": []}))).unwrap_err();
        assert_eq!(err.to_string(), NO_IMAGE_EDITED);
    }
}
