use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

pub const PNG_MIME: &str = "image/png";

/// An encoded image as handed around between adapters and the front end.
///
/// Payloads are never modified in place, an edit produces a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Standard Base64, no data-URL prefix.
    pub data: String,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::new(BASE64.encode(bytes), mime_type)
    }

    pub fn png(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes, PNG_MIME)
    }

    /// Splits `data:<mime>;base64,<payload>` into its parts.
    pub fn from_data_url(url: &str) -> Result<Self, AdapterError> {
        let parse_err = || AdapterError::Parse("expected a base64 data URL".into());

        let (header, data) = url.split_once(',').ok_or_else(parse_err)?;
        let mime_type = header
            .strip_prefix("data:")
            .and_then(|h| h.split(';').next())
            .filter(|m| !m.is_empty())
            .ok_or_else(parse_err)?;
        if data.is_empty() {
            return Err(parse_err());
        }

        Ok(Self::new(data, mime_type))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, AdapterError> {
        BASE64
            .decode(&self.data)
            .map_err(|e| AdapterError::Decode(format!("invalid base64 payload: {e}")))
    }
}

/// What the front end asks for. A source image turns it into an edit.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub source_image: Option<ImagePayload>,
}

impl GenerationRequest {
    pub fn generate(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            source_image: None,
        }
    }

    pub fn edit(image: ImagePayload, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            source_image: Some(image),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.source_image.is_some()
    }
}

/// An image together with the seed the backend reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub image: ImagePayload,
    pub seed: Option<String>,
}

/// What a provider call produced. The seed is kept apart from the image so it
/// survives a failure that happens after the backend answered, e.g. while
/// fetching the image it pointed to.
#[derive(Debug)]
pub struct Outcome {
    pub seed: Option<String>,
    pub image: Result<ImagePayload, AdapterError>,
}

impl Outcome {
    pub fn failed(err: AdapterError) -> Self {
        Self {
            seed: None,
            image: Err(err),
        }
    }

    pub fn into_result(self) -> Result<Generated, AdapterError> {
        let seed = self.seed;
        self.image.map(|image| Generated { image, seed })
    }
}

impl From<Result<ImagePayload, AdapterError>> for Outcome {
    fn from(image: Result<ImagePayload, AdapterError>) -> Self {
        Self { seed: None, image }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_data_url() {
        let payload = ImagePayload::from_data_url("data:image/jpeg;base64,AAEC").unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
        assert_eq!(payload.data, "AAEC");
        assert_eq!(payload.decode_bytes().unwrap(), vec![0, 1, 2]);
        assert_eq!(payload.to_data_url(), "data:image/jpeg;base64,AAEC");
    }

    #[test]
    fn data_url_without_parts_is_rejected() {
        for url in ["", "data:image/png;base64,", "data:;base64,AAAA", "image/png,AAAA", "AAAA"] {
            let err = ImagePayload::from_data_url(url).unwrap_err();
            assert!(matches!(err, AdapterError::Parse(_)), "{url}: {err:?}");
        }
    }

    #[test]
    fn invalid_base64_is_a_decode_failure() {
        let err = ImagePayload::new("not base64!", PNG_MIME)
            .decode_bytes()
            .unwrap_err();
        assert!(matches!(err, AdapterError::Decode(_)));
    }

    #[test]
    fn source_image_marks_an_edit() {
        assert!(!GenerationRequest::generate("a face").is_edit());
        let req = GenerationRequest::edit(ImagePayload::png(&[1, 2, 3]), "smile");
        assert!(req.is_edit());
    }

    #[test]
    fn failed_outcome_keeps_reported_seed() {
        let outcome = Outcome {
            seed: Some("7".into()),
            image: Err(AdapterError::ResponseShape("gone".into())),
        };
        assert_eq!(outcome.seed.as_deref(), Some("7"));
        assert!(outcome.into_result().is_err());

        let generated = Outcome::from(Ok(ImagePayload::png(&[1])))
            .into_result()
            .unwrap();
        assert_eq!(generated.seed, None);
    }
}
