use std::{fmt, sync::Arc};

use crate::{FetchError, ResponseData, TransportRequest, TransportResponse};

pub type BeforeRequestFn = Arc<dyn Fn(&str, &mut TransportRequest) + Send + Sync>;
pub type AfterResponseFn = Arc<dyn Fn(&TransportResponse) + Send + Sync>;
pub type OnSuccessFn = Arc<dyn Fn(&ResponseData) + Send + Sync>;
pub type OnErrorFn = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// Per-request lifecycle callbacks. Every hook is optional.
///
/// - `before_request`: once per descriptor, before the first attempt. A
///   successful re-authentication produces a new descriptor, so it runs again
///   after each refresh.
/// - `after_response`: once, for the successful response.
/// - `on_success`: once, with the decoded payload, after `after_response`.
/// - `on_error`: once per failed attempt, including the final one.
#[derive(Clone, Default)]
pub struct Hooks {
    before_request: Option<BeforeRequestFn>,
    after_response: Option<AfterResponseFn>,
    on_success: Option<OnSuccessFn>,
    on_error: Option<OnErrorFn>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_request", &self.before_request.is_some())
            .field("after_response", &self.after_response.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl Hooks {
    pub fn before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &mut TransportRequest) + Send + Sync + 'static,
    {
        self.before_request = Some(Arc::new(hook));
        self
    }

    pub fn after_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TransportResponse) + Send + Sync + 'static,
    {
        self.after_response = Some(Arc::new(hook));
        self
    }

    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResponseData) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FetchError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub(crate) fn run_before_request(&self, url: &str, request: &mut TransportRequest) {
        if let Some(hook) = &self.before_request {
            hook(url, request);
        }
    }

    pub(crate) fn run_after_response(&self, response: &TransportResponse) {
        if let Some(hook) = &self.after_response {
            hook(response);
        }
    }

    pub(crate) fn run_on_success(&self, data: &ResponseData) {
        if let Some(hook) = &self.on_success {
            hook(data);
        }
    }

    pub(crate) fn run_on_error(&self, error: &FetchError) {
        if let Some(hook) = &self.on_error {
            hook(error);
        }
    }
}
