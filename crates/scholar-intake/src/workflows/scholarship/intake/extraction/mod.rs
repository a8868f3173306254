//! Client for the structured-extraction webhooks.
//!
//! Each document kind has its own channel. A call validates the OCR text,
//! signs the exact request body, posts it, and flattens the response into
//! [`NormalizedFields`]. There is no automatic retry; transient failures are
//! surfaced so the caller can offer one.

mod auth;
mod normalize;
mod transport;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::workflows::scholarship::payload::DocumentKind;

use super::file::UploadedFile;

pub use auth::{RequestSigner, SharedSecretSigner, SigningError, TokenClaims};
pub use normalize::{normalize_response, ExtractionField, FieldValue, NormalizedFields};
pub use transport::{ExtractionTransport, HttpExtractionTransport, TransportResponse};

/// Upper bound on OCR text accepted by every channel, in characters.
pub const MAX_TEXT_CHARS: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionChannel {
    Id,
    Grades,
    Registration,
}

impl ExtractionChannel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Grades => "cog",
            Self::Registration => "cor",
        }
    }

    pub const fn document_kind(self) -> DocumentKind {
        match self {
            Self::Id => DocumentKind::Id,
            Self::Grades => DocumentKind::Cog,
            Self::Registration => DocumentKind::Cor,
        }
    }
}

impl From<DocumentKind> for ExtractionChannel {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Id => Self::Id,
            DocumentKind::Cog => Self::Grades,
            DocumentKind::Cor => Self::Registration,
        }
    }
}

/// Broad grouping used to pick the user-facing message and retry affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Transport,
    Auth,
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("invalid extraction input: {0}")]
    InvalidInput(String),
    #[error("extraction timed out after {after_secs}s")]
    Timeout { after_secs: u64 },
    #[error("network error contacting extraction service: {0}")]
    NetworkError(String),
    #[error("extraction service rejected credentials: {0}")]
    AuthFailure(String),
    #[error("extraction service unavailable (status {status}): {message}")]
    ServiceUnavailable { status: u16, message: String },
    #[error("unexpected extraction response: {0}")]
    BadResponseShape(String),
}

impl ExtractionError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_) => ErrorCategory::Validation,
            Self::Timeout { .. } | Self::NetworkError(_) => ErrorCategory::Transport,
            Self::AuthFailure(_) => ErrorCategory::Auth,
            Self::ServiceUnavailable { .. } | Self::BadResponseShape(_) => ErrorCategory::Service,
        }
    }

    /// Whether trying the same request again may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::NetworkError(_) | Self::ServiceUnavailable { .. }
        )
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => {
                "We could not read enough text from this file. Upload a clearer copy or fill in the details manually."
            }
            Self::Timeout { .. } => {
                "Reading the document took too long. Check your connection and try again."
            }
            Self::NetworkError(_) => {
                "We could not reach the document service. Check your connection and try again."
            }
            Self::AuthFailure(_) => {
                "Document processing is not available right now. Please fill in the details manually."
            }
            Self::ServiceUnavailable { .. } => {
                "The document service is busy. Please try again in a moment."
            }
            Self::BadResponseShape(_) => {
                "We could not interpret this document. Please fill in the details manually."
            }
        }
    }
}

/// Body posted to every channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub ocr_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEndpoints {
    pub id: String,
    pub grades: String,
    pub registration: String,
}

impl ChannelEndpoints {
    pub fn url(&self, channel: ExtractionChannel) -> &str {
        match channel {
            ExtractionChannel::Id => &self.id,
            ExtractionChannel::Grades => &self.grades,
            ExtractionChannel::Registration => &self.registration,
        }
    }
}

/// Async seam the document processor calls; implemented by the HTTP client
/// and by scripted fakes.
#[async_trait::async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(
        &self,
        channel: ExtractionChannel,
        raw_text: &str,
        file: Option<&UploadedFile>,
        user_id: Option<&str>,
    ) -> Result<Option<NormalizedFields>, ExtractionError>;
}

#[derive(Clone)]
pub struct StructuredExtractorClient {
    endpoints: ChannelEndpoints,
    signer: Arc<dyn RequestSigner>,
    transport: Arc<dyn ExtractionTransport>,
}

impl StructuredExtractorClient {
    pub fn new(
        endpoints: ChannelEndpoints,
        signer: Arc<dyn RequestSigner>,
        transport: Arc<dyn ExtractionTransport>,
    ) -> Self {
        Self {
            endpoints,
            signer,
            transport,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let signer = SharedSecretSigner::new(config.shared_secret.as_bytes())
            .map_err(|err| ExtractionError::AuthFailure(err.to_string()))?;
        let transport = HttpExtractionTransport::new(config.timeout)?;

        Ok(Self::new(
            ChannelEndpoints {
                id: config.id_url.clone(),
                grades: config.grades_url.clone(),
                registration: config.registration_url.clone(),
            },
            Arc::new(signer),
            Arc::new(transport),
        ))
    }
}

/// Reject text the channels would refuse, before any network traffic.
pub fn validate_text(raw_text: &str) -> Result<(), ExtractionError> {
    if raw_text.trim().is_empty() {
        return Err(ExtractionError::InvalidInput(
            "OCR text is empty".to_string(),
        ));
    }

    let length = raw_text.chars().count();
    if length > MAX_TEXT_CHARS {
        return Err(ExtractionError::InvalidInput(format!(
            "OCR text is {length} characters; the limit is {MAX_TEXT_CHARS}"
        )));
    }

    Ok(())
}

/// Map a non-success HTTP status onto the error taxonomy.
pub fn status_error(status: u16, body: &[u8]) -> ExtractionError {
    let message = extract_error_message(body);
    match status {
        400 | 413 | 422 => ExtractionError::InvalidInput(message),
        401 | 403 => ExtractionError::AuthFailure(message),
        408 | 504 => ExtractionError::Timeout { after_secs: 0 },
        _ => ExtractionError::ServiceUnavailable { status, message },
    }
}

fn extract_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).chars().take(200).collect())
}

#[async_trait::async_trait]
impl StructuredExtractor for StructuredExtractorClient {
    async fn extract(
        &self,
        channel: ExtractionChannel,
        raw_text: &str,
        file: Option<&UploadedFile>,
        user_id: Option<&str>,
    ) -> Result<Option<NormalizedFields>, ExtractionError> {
        validate_text(raw_text)?;

        let request = ExtractionRequest {
            ocr_text: raw_text.to_string(),
            file_data: file.map(|file| file.encode().data),
            file_name: file.map(|file| file.name.clone()),
            user_id: user_id.map(str::to_string),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|err| ExtractionError::InvalidInput(err.to_string()))?;
        let token = self
            .signer
            .sign(channel, &body)
            .map_err(|err| ExtractionError::AuthFailure(err.to_string()))?;

        debug!(
            channel = channel.label(),
            chars = raw_text.chars().count(),
            with_file = file.is_some(),
            "requesting structured extraction"
        );
        let response = self
            .transport
            .post(self.endpoints.url(channel), &token, body)
            .await?;

        if !(200..300).contains(&response.status) {
            let err = status_error(response.status, &response.body);
            warn!(channel = channel.label(), status = response.status, error = %err, "extraction failed");
            return Err(err);
        }

        let value: serde_json::Value = serde_json::from_slice(&response.body)
            .map_err(|err| ExtractionError::BadResponseShape(err.to_string()))?;
        normalize_response(channel, value)
    }
}

impl std::fmt::Debug for StructuredExtractorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredExtractorClient")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}
