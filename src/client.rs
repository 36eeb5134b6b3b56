use std::{
    fmt,
    sync::{Arc, RwLock},
};

use reqwest::Method;

use crate::{
    handler::RequestHandler, ApiConfig, ApiConfigUpdate, ReqwestTransport, RequestOptions,
    ResponseData, Result, TokenManager, Transport,
};

/// HTTP client with token refresh, retries, timeouts and hooks.
///
/// Cloning is cheap; clones share configuration and the token refresh
/// state, so concurrent requests from any clone refresh at most once.
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

struct ApiInner {
    config: RwLock<ApiConfig>,
    tokens: Arc<TokenManager>,
    handler: RequestHandler,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("config", &self.get_config())
            .field("tokens", &self.inner.tokens)
            .finish()
    }
}

impl Api {
    /// Creates a client that sends requests with `reqwest`.
    pub fn new(config: ApiConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    /// Creates a client on top of a custom [`Transport`].
    pub fn with_transport(config: ApiConfig, transport: Arc<dyn Transport>) -> Self {
        let tokens = Arc::new(TokenManager::new());
        Self {
            inner: Arc::new(ApiInner {
                config: RwLock::new(config),
                handler: RequestHandler::new(tokens.clone(), transport),
                tokens,
            }),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `HS_FETCH_BASE_URL` — base URL for relative request paths
    /// - `HS_FETCH_TOKEN` — optional static access token
    ///
    /// Returns an error if the base URL is missing or empty.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use hs_fetch::Api;
    ///
    /// let api = Api::from_env().expect("missing HS_FETCH_BASE_URL");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("HS_FETCH_BASE_URL")
            .map_err(|_| "missing HS_FETCH_BASE_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("HS_FETCH_BASE_URL is set but empty".to_owned());
        }

        let mut config = ApiConfig::new(base_url.trim());
        if let Ok(token) = std::env::var("HS_FETCH_TOKEN") {
            if !token.trim().is_empty() {
                config = config.static_token(token.trim());
            }
        }
        Ok(Self::new(config))
    }

    /// Sends a request using `options.method` (GET when unset).
    pub async fn request(&self, options: RequestOptions) -> Result<ResponseData> {
        let config = self.get_config();
        self.inner.handler.execute(options, &config).await
    }

    pub async fn get(&self, options: RequestOptions) -> Result<ResponseData> {
        self.request(options.method(Method::GET)).await
    }

    pub async fn post(&self, options: RequestOptions) -> Result<ResponseData> {
        self.request(options.method(Method::POST)).await
    }

    pub async fn put(&self, options: RequestOptions) -> Result<ResponseData> {
        self.request(options.method(Method::PUT)).await
    }

    pub async fn patch(&self, options: RequestOptions) -> Result<ResponseData> {
        self.request(options.method(Method::PATCH)).await
    }

    pub async fn delete(&self, options: RequestOptions) -> Result<ResponseData> {
        self.request(options.method(Method::DELETE)).await
    }

    /// Snapshot of the current configuration.
    pub fn get_config(&self) -> ApiConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Merges `update` into the configuration. Requests already in flight
    /// keep the snapshot they started with.
    pub fn update_config(&self, update: ApiConfigUpdate) {
        self.inner
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .merge(update);
    }

    /// Refresh coordinator shared by every request of this client.
    pub fn token_manager(&self) -> &TokenManager {
        &self.inner.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::Api;
    use crate::{ApiConfig, ApiConfigUpdate};

    #[test]
    fn update_config_is_visible_to_clones() {
        let api = Api::new(ApiConfig::new("https://a.test"));
        let clone = api.clone();
        api.update_config(ApiConfigUpdate::new().base_url("https://b.test"));
        assert_eq!(clone.get_config().base_url, "https://b.test");
    }

    #[test]
    fn debug_redacts_token_getter() {
        let api = Api::new(ApiConfig::new("https://a.test").static_token("secret-token"));
        let debug = format!("{api:?}");
        assert!(debug.contains("https://a.test"));
        assert!(!debug.contains("secret-token"));
    }
}
