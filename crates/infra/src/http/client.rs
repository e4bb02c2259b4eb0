use std::time::{Duration, Instant};

use hookrelay_domain::constants::{DEFAULT_TIMEOUT_MS, MAX_LOGGED_BODY_BYTES};
use hookrelay_domain::{DeliveryError, HookRelayError};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Response};
use tracing::debug;
use url::Url;

use crate::errors::{InfraError, IntoDeliveryError};

/// Response to a successful (2xx) POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status: u16,
    /// Body text, truncated to `MAX_LOGGED_BODY_BYTES`
    pub body: String,
    pub elapsed: Duration,
}

/// HTTP client with a hard per-request timeout.
///
/// Performs exactly one request per call; retrying is left to the caller's
/// `RetryExecutor`.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, HookRelayError> {
        Self::builder().build()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST a JSON body and classify the outcome.
    ///
    /// Any 2xx is success. Other statuses become `DeliveryError::HttpStatus`;
    /// transport failures become `Network` or `Timeout`. The response body is
    /// read up to a bounded size and logged, never parsed.
    pub async fn post_json(
        &self,
        url: &Url,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<DeliveryResponse, DeliveryError> {
        let started = Instant::now();
        debug!(%url, bytes = body.len(), "sending webhook request");

        let response = self
            .client
            .post(url.clone())
            .headers(headers)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| {
                debug!(%url, error = %err, "webhook request failed");
                err.into_delivery(self.timeout)
            })?;

        let status = response.status();
        let body = read_bounded_body(response, MAX_LOGGED_BODY_BYTES).await;
        let elapsed = started.elapsed();
        debug!(
            %url,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            body = %body,
            "received webhook response"
        );

        if !status.is_success() {
            return Err(DeliveryError::http_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
            ));
        }

        Ok(DeliveryResponse { status: status.as_u16(), body, elapsed })
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient, HookRelayError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            HookRelayError::from(infra)
        })?;

        Ok(HttpClient { client, timeout: self.timeout })
    }
}

/// Read at most `limit` bytes of the body; errors end the read early.
async fn read_bounded_body(mut response: Response, limit: usize) -> String {
    let mut buf = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let remaining = limit.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
                if buf.len() >= limit {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "failed to read webhook response body");
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
