use std::{sync::Arc, time::Duration};

use reqwest::StatusCode;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Auth, request::RequestDescriptor, FetchError, RefreshError, ResponseData, Result,
    TokenManager, Transport, TransportRequest, TransportResponse,
};

/// Scratch state of a single attempt.
struct AttemptContext {
    attempt: u32,
    cancel: CancellationToken,
    deadline: Instant,
}

impl AttemptContext {
    fn new(attempt: u32, descriptor: &RequestDescriptor) -> Self {
        Self {
            attempt,
            cancel: CancellationToken::new(),
            deadline: deadline_after(descriptor.timeout),
        }
    }
}

/// Deadline `timeout` from now, clamped to roughly thirty years so that
/// `Duration::MAX` means "no timeout" instead of overflowing.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

/// Drives one logical request through attempts, timeouts, retries and
/// 401 re-authentication.
pub(crate) struct RequestExecutor {
    tokens: Arc<TokenManager>,
    transport: Arc<dyn Transport>,
}

impl RequestExecutor {
    pub fn new(tokens: Arc<TokenManager>, transport: Arc<dyn Transport>) -> Self {
        Self { tokens, transport }
    }

    pub async fn execute(&self, descriptor: RequestDescriptor, auth: &Auth) -> Result<ResponseData> {
        let mut descriptor = descriptor;
        let mut request = Self::prepare(&descriptor);
        let mut attempt = 0u32;
        let mut reauths = 0u32;

        loop {
            let context = AttemptContext::new(attempt, &descriptor);
            let outcome = self.send(&descriptor.url, &request, &context).await;

            let error = match outcome {
                Ok(response) if response.status == StatusCode::UNAUTHORIZED => {
                    match self.reauthenticate(&descriptor, auth, &mut reauths).await {
                        Ok(next) => {
                            // A refresh never spends the retry budget.
                            descriptor = next;
                            request = Self::prepare(&descriptor);
                            continue;
                        }
                        Err(error) => {
                            descriptor.hooks.run_on_error(&error);
                            return Err(error);
                        }
                    }
                }
                Ok(response) => match Self::complete(&descriptor, &response) {
                    Ok(data) => return Ok(data),
                    Err(error) => error,
                },
                Err(error) => error,
            };

            descriptor.hooks.run_on_error(&error);
            if context.attempt >= descriptor.retry_count || !error.is_retryable() {
                return Err(error);
            }

            let delay = descriptor.backoff.delay(descriptor.retry_delay, context.attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = context.attempt,
                error = %error,
                "retrying {} {} after {} ms",
                descriptor.method,
                descriptor.url,
                delay.as_millis()
            );

            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Builds the transport request for a descriptor and lets
    /// `before_request` adjust it once.
    fn prepare(descriptor: &RequestDescriptor) -> TransportRequest {
        let mut request = descriptor.transport_request();
        descriptor
            .hooks
            .run_before_request(&descriptor.url, &mut request);
        request
    }

    /// Races the transport against the attempt deadline.
    async fn send(
        &self,
        url: &str,
        request: &TransportRequest,
        context: &AttemptContext,
    ) -> Result<TransportResponse> {
        tokio::select! {
            biased;
            result = self.transport.send(url, request, &context.cancel) => result,
            _ = sleep_until(context.deadline) => {
                context.cancel.cancel();

                #[cfg(feature = "tracing")]
                tracing::debug!(attempt = context.attempt, "request to {} timed out", url);

                Err(FetchError::Timeout)
            }
        }
    }

    async fn reauthenticate(
        &self,
        descriptor: &RequestDescriptor,
        auth: &Auth,
        reauths: &mut u32,
    ) -> Result<RequestDescriptor> {
        if *reauths >= descriptor.max_reauth {
            return Err(FetchError::auth(RefreshError::new(
                "server rejected the credential",
            )));
        }
        *reauths += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!("received 401 from {}, refreshing token", descriptor.url);

        auth.refresh(&self.tokens).await.map_err(FetchError::auth)?;

        let token = auth.token().await;
        if descriptor.use_token && token.as_deref().map_or(true, str::is_empty) {
            return Err(FetchError::auth(RefreshError::new(
                "token refresh yielded no token",
            )));
        }
        descriptor.with_token(token.as_deref())
    }

    fn complete(descriptor: &RequestDescriptor, response: &TransportResponse) -> Result<ResponseData> {
        if !response.is_ok() {
            return Err(http_error(response));
        }

        let data = ResponseData::from_response(response)?;
        descriptor.hooks.run_after_response(response);
        descriptor.hooks.run_on_success(&data);
        Ok(data)
    }
}

/// Maps a non-success response to [`FetchError::Http`], preferring the
/// `message` field of a JSON body.
fn http_error(response: &TransportResponse) -> FetchError {
    let message = serde_json::from_slice::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|body| {
            body.get("message")
                .and_then(|message| message.as_str())
                .filter(|message| !message.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| "Request failed".to_owned());

    FetchError::Http {
        status: response.status,
        message,
    }
}
