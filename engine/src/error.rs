use reqwest::StatusCode;
use thiserror::Error;

/// Longest response body excerpt carried inside an error message.
pub const MAX_BODY_EXCERPT: usize = 512;

/// Failures produced inside a provider adapter.
///
/// The variant is decided where the failure happens, so callers (most notably
/// the [retry policy](crate::retry::RetryPolicy)) never have to inspect
/// message text.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A required endpoint or credential is missing.
    #[error("{0}")]
    Configuration(String),

    /// The connection failed before an HTTP status was received.
    #[error("Network error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("{provider} request failed: {status}{}", body_suffix(.body))]
    Application {
        provider: &'static str,
        status: StatusCode,
        body: String,
    },

    /// A field that should be present in a parsed response is absent.
    #[error("{0}")]
    ResponseShape(String),

    /// The image proxy or the upstream image host answered with a non-success status.
    #[error("Fetch image failed: {status}{}", body_suffix(.body))]
    Fetch { status: StatusCode, body: String },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// A locally sourced image could not be split into MIME type and payload.
    #[error("Failed to parse image data: {0}")]
    Parse(String),

    /// The provider answered successfully but without any image.
    #[error("{0}")]
    NoImageReturned(String),
}

impl AdapterError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Maps a failed outbound request onto the taxonomy.
    ///
    /// Anything that failed before a status line arrived counts as a
    /// transport failure. A status carried by the error is an application
    /// failure, and a body that could not be parsed is a shape error. A
    /// request that could not even be built points at a bad endpoint.
    pub fn from_request(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::Configuration(format!("{provider} endpoint is invalid: {err}"));
        }
        if let Some(status) = err.status() {
            return Self::Application {
                provider,
                status,
                body: String::new(),
            };
        }
        if err.is_decode() {
            return Self::ResponseShape(format!("{provider} response could not be decoded: {err}"));
        }
        // connect, timeout, request and body errors all end up here
        Self::Transport(error_chain(&err))
    }

    pub fn application(provider: &'static str, status: StatusCode, body: &str) -> Self {
        Self::Application {
            provider,
            status,
            body: excerpt(body),
        }
    }

    pub fn fetch(status: StatusCode, body: &str) -> Self {
        Self::Fetch {
            status,
            body: excerpt(body),
        }
    }
}

/// The one error kind handed to callers of the
/// [`PortraitService`](crate::dispatch::PortraitService).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Which provider operation failed, e.g. `qwen.edit`.
    pub context: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(context: impl Into<String>, err: &AdapterError) -> Self {
        Self {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

pub(crate) fn excerpt(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!("\n{body}")
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
