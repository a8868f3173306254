use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::config::SubmissionConfig;
use crate::workflows::scholarship::payload::SubmissionPayload;

const SUBMISSION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub application_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("submission rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("network error during submission: {0}")]
    Network(String),
    #[error("unexpected submission response: {0}")]
    BadResponse(String),
}

/// Delivers an assembled payload to the review service.
#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, SubmissionError>;
}

#[derive(Debug, Clone)]
pub struct HttpSubmissionClient {
    client: reqwest::Client,
    url: String,
}

impl HttpSubmissionClient {
    pub fn new(url: impl Into<String>) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(SUBMISSION_TIMEOUT)
            .build()
            .map_err(|err| SubmissionError::Network(err.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &SubmissionConfig) -> Result<Self, SubmissionError> {
        Self::new(config.url.clone())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[async_trait]
impl SubmissionTransport for HttpSubmissionClient {
    async fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|err| SubmissionError::Network(err.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| SubmissionError::Network(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|body| body.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let receipt: SubmissionReceipt = serde_json::from_slice(&body)
            .map_err(|err| SubmissionError::BadResponse(err.to_string()))?;
        info!(application_id = %receipt.application_id, "application submitted");
        Ok(receipt)
    }
}
