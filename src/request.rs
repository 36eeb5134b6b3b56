use std::time::Duration;

use reqwest::{header::HeaderMap, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    headers::build_headers, url::Query, Backoff, FetchError, Hooks, ResponseData, Result,
    TransportRequest, TransportResponse,
};

/// Parameters of one call through [`Api`](crate::Api).
///
/// Unset timeout/retry fields fall back to the client's
/// [`ClientOptions`](crate::ClientOptions).
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub url: String,
    pub method: Option<Method>,
    pub query: Option<Query>,
    pub body: Option<JsonValue>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub retry_count: Option<u32>,
    pub retry_delay: Option<Duration>,
    /// Whether to send the `Authorization` header. Defaults to `true`.
    pub use_token: Option<bool>,
    pub hooks: Hooks,
}

impl RequestOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds one query parameter. `null` and `""` values are dropped from the URL.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.query
            .get_or_insert_with(Query::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<JsonValue>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `body` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|err| FetchError::Encode(format!("request body is not JSON: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    pub fn use_token(mut self, use_token: bool) -> Self {
        self.use_token = Some(use_token);
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &mut TransportRequest) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.before_request(hook);
        self
    }

    pub fn after_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TransportResponse) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.after_response(hook);
        self
    }

    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResponseData) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_success(hook);
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FetchError) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_error(hook);
        self
    }
}

/// Immutable record of one logical request, as handed to the executor.
#[derive(Clone, Debug)]
pub(crate) struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
    pub headers: HeaderMap,
    pub user_headers: Vec<(String, String)>,
    pub use_token: bool,
    pub authorization_type: Option<String>,
    pub timeout: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub backoff: Backoff,
    pub max_reauth: u32,
    pub hooks: Hooks,
}

impl RequestDescriptor {
    /// Copy of this descriptor with headers rebuilt around `token`.
    pub fn with_token(&self, token: Option<&str>) -> Result<Self> {
        let headers = build_headers(
            token,
            &self.user_headers,
            self.use_token,
            self.authorization_type.as_deref(),
        )?;
        Ok(Self {
            headers,
            ..self.clone()
        })
    }

    pub fn transport_request(&self) -> TransportRequest {
        TransportRequest {
            method: self.method.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

impl ResponseData {
    pub(crate) fn from_response(response: &TransportResponse) -> Result<Self> {
        if !response.is_json() {
            return Ok(Self::Text(response.text()));
        }
        if response.body.is_empty() {
            return Ok(Self::Json(JsonValue::Null));
        }
        response.json().map(Self::Json)
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }

    /// Deserializes a JSON payload into `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Json(value) => serde_json::from_value(value)
                .map_err(|err| FetchError::Decode(format!("unexpected payload shape: {err}"))),
            Self::Text(text) => Err(FetchError::Decode(format!(
                "expected JSON payload, got text: {text}"
            ))),
        }
    }
}
