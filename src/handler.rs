use std::{sync::Arc, time::Duration};

use reqwest::Method;

use crate::{
    config::Auth, executor::RequestExecutor, headers::build_headers, jwt::has_expired_claim,
    request::RequestDescriptor, url::build_url, ApiConfig, FetchError, RequestOptions,
    ResponseData, Result, TokenManager, Transport,
};

/// Turns [`RequestOptions`] plus a configuration snapshot into a descriptor
/// and runs it.
pub(crate) struct RequestHandler {
    tokens: Arc<TokenManager>,
    executor: RequestExecutor,
}

impl RequestHandler {
    pub fn new(tokens: Arc<TokenManager>, transport: Arc<dyn Transport>) -> Self {
        Self {
            executor: RequestExecutor::new(tokens.clone(), transport),
            tokens,
        }
    }

    pub async fn execute(&self, options: RequestOptions, config: &ApiConfig) -> Result<ResponseData> {
        let auth = config.auth();
        let descriptor = self.describe(options, config, &auth).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!("{} {}", descriptor.method, descriptor.url);

        self.executor.execute(descriptor, &auth).await
    }

    async fn describe(
        &self,
        options: RequestOptions,
        config: &ApiConfig,
        auth: &Auth,
    ) -> Result<RequestDescriptor> {
        let defaults = &config.options;
        let use_token = options.use_token.unwrap_or(true);
        let url = build_url(&options.url, options.query.as_ref(), &config.base_url);

        let token = if use_token {
            self.current_token(auth, config.options.refresh_expired_tokens)
                .await?
        } else {
            None
        };
        let headers = build_headers(
            token.as_deref(),
            &options.headers,
            use_token,
            config.authorization_type.as_deref(),
        )?;

        Ok(RequestDescriptor {
            method: options.method.unwrap_or(Method::GET),
            url,
            body: options
                .body
                .filter(|body| !body.is_null())
                .map(|body| body.to_string()),
            headers,
            user_headers: options.headers,
            use_token,
            authorization_type: config.authorization_type.clone(),
            timeout: options
                .timeout
                .unwrap_or(Duration::from_millis(defaults.timeout_ms)),
            retry_count: options.retry_count.unwrap_or(defaults.retry_count),
            retry_delay: options
                .retry_delay
                .unwrap_or(Duration::from_millis(defaults.retry_delay_ms)),
            backoff: defaults.backoff,
            max_reauth: defaults.max_reauth,
            hooks: options.hooks,
        })
    }

    /// Reads the token, refreshing it first when it is a JWT past its `exp`.
    async fn current_token(&self, auth: &Auth, refresh_expired: bool) -> Result<Option<String>> {
        let token = auth.token().await;
        let expired = token.as_deref().is_some_and(has_expired_claim);
        if !(expired && refresh_expired && auth.can_refresh()) {
            return Ok(token);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("access token expired, refreshing before dispatch");

        auth.refresh(&self.tokens).await.map_err(FetchError::auth)?;
        Ok(auth.token().await)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use reqwest::{
        header::{HeaderMap, AUTHORIZATION},
        Method, StatusCode,
    };
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::RequestHandler;
    use crate::{
        jwt::tests::token_with_exp, ApiConfig, ClientOptions, FetchError, RefreshError,
        RequestOptions, Result, TokenManager, Transport, TransportRequest, TransportResponse,
    };

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, TransportRequest)>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(
            &self,
            url: &str,
            request: &TransportRequest,
            _cancel: &CancellationToken,
        ) -> Result<TransportResponse> {
            self.seen
                .lock()
                .expect("recorder")
                .push((url.to_owned(), request.clone()));
            Ok(TransportResponse::new(StatusCode::OK, HeaderMap::new(), "ok"))
        }
    }

    fn handler(transport: Arc<Recorder>) -> RequestHandler {
        RequestHandler::new(Arc::new(TokenManager::new()), transport)
    }

    #[tokio::test]
    async fn builds_url_headers_and_body() {
        let recorder = Arc::new(Recorder::default());
        let handler = handler(recorder.clone());
        let config = ApiConfig::new("https://api.test/v1/").static_token("abc");

        handler
            .execute(
                RequestOptions::new("/users")
                    .method(Method::POST)
                    .query("select", "*")
                    .query("empty", "")
                    .body(json!({"name": "Kit"}))
                    .header("X-Trace", "7"),
                &config,
            )
            .await
            .expect("request");

        let seen = recorder.seen.lock().expect("recorder");
        let (url, request) = &seen[0];
        assert_eq!(url, "https://api.test/v1/users?select=%2A");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.headers[AUTHORIZATION], "Bearer abc");
        assert_eq!(request.headers["x-trace"], "7");
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"Kit"}"#));
    }

    #[tokio::test]
    async fn use_token_false_skips_token_lookup() {
        let recorder = Arc::new(Recorder::default());
        let handler = handler(recorder.clone());
        let lookups = Arc::new(AtomicUsize::new(0));
        let config = {
            let lookups = lookups.clone();
            ApiConfig::new("https://api.test").get_token(move || {
                lookups.fetch_add(1, Ordering::SeqCst);
                Some("abc".to_owned())
            })
        };

        handler
            .execute(RequestOptions::new("/public").use_token(false), &config)
            .await
            .expect("request");

        let seen = recorder.seen.lock().expect("recorder");
        assert!(!seen[0].1.headers.contains_key(AUTHORIZATION));
        assert_eq!(lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_jwt_is_refreshed_before_dispatch() {
        let recorder = Arc::new(Recorder::default());
        let handler = handler(recorder.clone());
        let token = Arc::new(Mutex::new(token_with_exp(1)));
        let refreshes = Arc::new(AtomicUsize::new(0));

        let config = {
            let read = token.clone();
            let write = token.clone();
            let refreshes = refreshes.clone();
            ApiConfig::new("https://api.test")
                .get_token(move || Some(read.lock().expect("token").clone()))
                .on_refresh_token(move || {
                    refreshes.fetch_add(1, Ordering::SeqCst);
                    *write.lock().expect("token") = "fresh".to_owned();
                    async { Ok(()) }
                })
        };

        handler
            .execute(RequestOptions::new("/me"), &config)
            .await
            .expect("request");

        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        let seen = recorder.seen.lock().expect("recorder");
        assert_eq!(seen[0].1.headers[AUTHORIZATION], "Bearer fresh");
    }

    #[tokio::test]
    async fn opaque_token_is_not_refreshed() {
        let recorder = Arc::new(Recorder::default());
        let handler = handler(recorder.clone());
        let refreshes = Arc::new(AtomicUsize::new(0));
        let config = {
            let refreshes = refreshes.clone();
            ApiConfig::new("https://api.test")
                .static_token("test-token")
                .on_refresh_token(move || {
                    refreshes.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                })
        };

        handler
            .execute(RequestOptions::new("/me"), &config)
            .await
            .expect("request");
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_proactive_refresh_is_terminal() {
        let recorder = Arc::new(Recorder::default());
        let handler = handler(recorder.clone());
        let config = ApiConfig::new("https://api.test")
            .static_token(token_with_exp(1))
            .on_refresh_token(|| async { Err(RefreshError::new("revoked")) });

        let err = handler
            .execute(RequestOptions::new("/me"), &config)
            .await
            .expect_err("refresh must fail");
        assert!(matches!(err, FetchError::AuthRefresh { .. }));
        assert!(recorder.seen.lock().expect("recorder").is_empty());
    }

    #[tokio::test]
    async fn per_call_settings_override_client_defaults() {
        let recorder = Arc::new(Recorder::default());
        let handler = handler(recorder);
        let config = ApiConfig::new("https://api.test").with_options(ClientOptions {
            timeout_ms: 100,
            retry_count: 4,
            ..ClientOptions::default()
        });

        let descriptor = handler
            .describe(
                RequestOptions::new("/x").retry_count(1),
                &config,
                &config.auth(),
            )
            .await
            .expect("descriptor");
        assert_eq!(descriptor.retry_count, 1);
        assert_eq!(descriptor.timeout, Duration::from_millis(100));
        assert_eq!(descriptor.retry_delay, Duration::from_millis(1_000));
        assert_eq!(descriptor.method, Method::GET);
    }
}
