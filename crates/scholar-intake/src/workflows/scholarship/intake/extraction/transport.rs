use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use super::ExtractionError;

/// Status and body of a channel response, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Carries a signed request to an extraction endpoint.
#[async_trait]
pub trait ExtractionTransport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        bearer: &str,
        body: Vec<u8>,
    ) -> Result<TransportResponse, ExtractionError>;
}

/// reqwest-backed transport. The timeout aborts the request at the transport
/// level, independently of any caller-side cancellation.
pub struct HttpExtractionTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpExtractionTransport {
    pub fn new(timeout: Duration) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ExtractionError::NetworkError(err.to_string()))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl ExtractionTransport for HttpExtractionTransport {
    async fn post(
        &self,
        url: &str,
        bearer: &str,
        body: Vec<u8>,
    ) -> Result<TransportResponse, ExtractionError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| self.map_error(err))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| self.map_error(err))?
            .to_vec();

        Ok(TransportResponse { status, body })
    }
}

impl HttpExtractionTransport {
    fn map_error(&self, err: reqwest::Error) -> ExtractionError {
        if err.is_timeout() {
            ExtractionError::Timeout {
                after_secs: self.timeout.as_secs(),
            }
        } else {
            ExtractionError::NetworkError(err.to_string())
        }
    }
}

impl std::fmt::Debug for HttpExtractionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExtractionTransport")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
