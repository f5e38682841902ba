use std::io::Cursor;

use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use log::debug;
use reqwest::{Client, header::CONTENT_TYPE};

use crate::{
    error::AdapterError,
    payload::{ImagePayload, PNG_MIME},
};

/// Fetches provider images by URL and turns them into PNG payloads.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    client: Client,
    /// Proxy endpoint taking the target as `?url=`. Images are fetched
    /// directly when unset.
    proxy: Option<String>,
}

/// Raw bytes as served, before re-encoding.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl ImageNormalizer {
    pub fn new(client: Client, proxy: Option<String>) -> Self {
        Self { client, proxy }
    }

    pub async fn normalize(&self, url: &str) -> Result<ImagePayload, AdapterError> {
        let fetched = self.fetch(url).await?;
        debug!(
            "fetched {} bytes ({}) from {url}",
            fetched.bytes.len(),
            fetched.content_type.as_deref().unwrap_or("no content-type")
        );
        transcode_png(&fetched.bytes)
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedImage, AdapterError> {
        let request = match &self.proxy {
            Some(proxy) => self.client.get(proxy).query(&[("url", url)]),
            None => self.client.get(url),
        };

        let resp = request
            .send()
            .await
            .map_err(|e| AdapterError::from_request("Image", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::fetch(status, &body));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AdapterError::from_request("Image", e))?;

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

/// Decodes any supported image and re-encodes it as PNG at its natural size.
///
/// PNG input goes through the same path, so every payload leaving this
/// function was produced by our own encoder.
pub fn transcode_png(bytes: &[u8]) -> Result<ImagePayload, AdapterError> {
    let decoded = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AdapterError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| AdapterError::Decode(e.to_string()))?;

    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| AdapterError::Encode(e.to_string()))?;

    let out = out.into_inner();
    if out.is_empty() {
        return Err(AdapterError::Encode("encoder produced no data".into()));
    }

    Ok(ImagePayload::from_bytes(&out, PNG_MIME))
}

/// Re-encodes a payload that is already in memory, e.g. a local upload.
pub fn normalize_payload(payload: &ImagePayload) -> Result<ImagePayload, AdapterError> {
    transcode_png(&payload.decode_bytes()?)
}

/// Natural pixel size of a payload, or `(0, 0)` if it can't be read.
pub fn image_dimensions(payload: &ImagePayload) -> (u32, u32) {
    let read = || -> Option<(u32, u32)> {
        let bytes = payload.decode_bytes().ok()?;
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    };

    read().unwrap_or_else(|| {
        debug!("couldn't read dimensions of {} payload", payload.mime_type);
        (0, 0)
    })
}
