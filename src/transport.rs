use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{FetchError, Result};

/// Request handed to a [`Transport`].
///
/// `before_request` hooks receive this value mutably; whatever they change is
/// sent on every attempt of the same descriptor.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// Fully buffered response returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// `true` for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// `true` when the declared content type contains `application/json`.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|value| value.contains("application/json"))
    }

    /// Body as UTF-8, replacing invalid sequences. `body` keeps the raw bytes.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|err| {
            FetchError::Decode(format!(
                "invalid JSON response: {err}; body: {}",
                self.text()
            ))
        })
    }
}

/// Fetch primitive used by the executor.
///
/// Implementations should stop work and return promptly once `cancel` fires;
/// the executor has already given up on the attempt at that point.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        url: &str,
        request: &TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse>;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client (proxy, TLS roots, user agent, ...).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        url: &str,
        request: &TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse> {
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, FetchError>(TransportResponse::new(status, headers, body.to_vec()))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = exchange => result,
        }
    }
}
