use std::{fmt, future::Future, sync::Arc};

use futures::future::{BoxFuture, FutureExt};

use crate::{ClientOptions, RefreshError, TokenManager};

/// Returns the current access token, if any.
pub type GetTokenFn = Arc<dyn Fn() -> BoxFuture<'static, Option<String>> + Send + Sync>;
/// Obtains a new access token; `get_token` is expected to return it afterwards.
pub type RefreshTokenFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<(), RefreshError>> + Send + Sync>;
/// Notification fired once per failed refresh.
pub type RefreshFailedFn = Arc<dyn Fn() + Send + Sync>;

/// Client configuration.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL that relative request URLs are joined to.
    pub base_url: String,
    /// Scheme placed before the token in `Authorization`.
    ///
    /// `None` or an empty string sends the bare token.
    pub authorization_type: Option<String>,
    pub get_token: Option<GetTokenFn>,
    pub on_refresh_token: Option<RefreshTokenFn>,
    pub on_refresh_token_failed: Option<RefreshFailedFn>,
    pub options: ClientOptions,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            authorization_type: Some("Bearer".to_owned()),
            get_token: None,
            on_refresh_token: None,
            on_refresh_token_failed: None,
            options: ClientOptions::default(),
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("authorization_type", &self.authorization_type)
            .field("get_token", &self.get_token.as_ref().map(|_| "<fn>"))
            .field("on_refresh_token", &self.on_refresh_token.as_ref().map(|_| "<fn>"))
            .field(
                "on_refresh_token_failed",
                &self.on_refresh_token_failed.as_ref().map(|_| "<fn>"),
            )
            .field("options", &self.options)
            .finish()
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Uses a synchronous token getter.
    pub fn get_token<F>(mut self, get_token: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.get_token = Some(Arc::new(move || {
            let token = get_token();
            async move { token }.boxed()
        }));
        self
    }

    /// Uses an asynchronous token getter.
    pub fn get_token_async<F, Fut>(mut self, get_token: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        self.get_token = Some(Arc::new(move || get_token().boxed()));
        self
    }

    /// Always authenticates with the same token.
    pub fn static_token(self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.get_token(move || Some(token.clone()))
    }

    pub fn on_refresh_token<F, Fut>(mut self, refresh: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RefreshError>> + Send + 'static,
    {
        self.on_refresh_token = Some(Arc::new(move || refresh().boxed()));
        self
    }

    pub fn on_refresh_token_failed<F>(mut self, on_failed: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_refresh_token_failed = Some(Arc::new(on_failed));
        self
    }

    pub fn authorization_type(mut self, authorization_type: Option<&str>) -> Self {
        self.authorization_type = authorization_type.map(str::to_owned);
        self
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Shallow merge: every field present in `update` replaces the current one.
    pub fn merge(&mut self, update: ApiConfigUpdate) {
        if let Some(base_url) = update.base_url {
            self.base_url = base_url;
        }
        if let Some(authorization_type) = update.authorization_type {
            self.authorization_type = authorization_type;
        }
        if let Some(get_token) = update.get_token {
            self.get_token = Some(get_token);
        }
        if let Some(refresh) = update.on_refresh_token {
            self.on_refresh_token = Some(refresh);
        }
        if let Some(on_failed) = update.on_refresh_token_failed {
            self.on_refresh_token_failed = Some(on_failed);
        }
        if let Some(options) = update.options {
            self.options = options;
        }
    }

    pub(crate) fn auth(&self) -> Auth {
        Auth {
            get_token: self.get_token.clone(),
            refresh: self.on_refresh_token.clone(),
            on_failed: self.on_refresh_token_failed.clone(),
        }
    }
}

/// Partial configuration for [`Api::update_config`](crate::Api::update_config).
#[derive(Clone, Default)]
pub struct ApiConfigUpdate {
    pub base_url: Option<String>,
    /// `Some(None)` clears the authorization scheme.
    pub authorization_type: Option<Option<String>>,
    pub get_token: Option<GetTokenFn>,
    pub on_refresh_token: Option<RefreshTokenFn>,
    pub on_refresh_token_failed: Option<RefreshFailedFn>,
    pub options: Option<ClientOptions>,
}

impl ApiConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn authorization_type(mut self, authorization_type: Option<&str>) -> Self {
        self.authorization_type = Some(authorization_type.map(str::to_owned));
        self
    }

    pub fn get_token<F>(mut self, get_token: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.get_token = ApiConfig::default().get_token(get_token).get_token;
        self
    }

    pub fn get_token_async<F, Fut>(mut self, get_token: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        self.get_token = ApiConfig::default().get_token_async(get_token).get_token;
        self
    }

    pub fn on_refresh_token<F, Fut>(mut self, refresh: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RefreshError>> + Send + 'static,
    {
        self.on_refresh_token = ApiConfig::default().on_refresh_token(refresh).on_refresh_token;
        self
    }

    pub fn on_refresh_token_failed<F>(mut self, on_failed: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_refresh_token_failed = Some(Arc::new(on_failed));
        self
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Credential callbacks captured from one configuration snapshot.
#[derive(Clone, Default)]
pub(crate) struct Auth {
    get_token: Option<GetTokenFn>,
    refresh: Option<RefreshTokenFn>,
    on_failed: Option<RefreshFailedFn>,
}

impl Auth {
    pub(crate) async fn token(&self) -> Option<String> {
        match &self.get_token {
            Some(get_token) => get_token().await,
            None => None,
        }
    }

    pub(crate) fn can_refresh(&self) -> bool {
        self.refresh.is_some()
    }

    /// Refreshes through `tokens` so concurrent callers share one refresh.
    pub(crate) async fn refresh(&self, tokens: &TokenManager) -> Result<(), RefreshError> {
        let Some(refresh) = &self.refresh else {
            return Err(RefreshError::new("no refresh callback configured"));
        };
        tokens
            .handle_refresh(|| refresh(), self.on_failed.as_deref())
            .await
    }
}
