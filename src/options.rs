use std::time::Duration;

/// Delay strategy between retry attempts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Backoff {
    /// Wait `retry_delay` before every retry.
    #[default]
    Fixed,
    /// Wait `retry_delay * 2^attempt` before the next retry.
    Exponential,
}

impl Backoff {
    /// Delay before the retry that follows the zero-based `attempt`.
    pub fn delay(self, base: Duration, attempt: u32) -> Duration {
        match self {
            Self::Fixed => base,
            Self::Exponential => {
                let multiplier = 1u32 << attempt.min(16);
                base.saturating_mul(multiplier)
            }
        }
    }
}

/// Configures timeout, retry and re-authentication behavior.
///
/// Values here are client-wide defaults; [`RequestOptions`](crate::RequestOptions)
/// can override timeout and retry settings per call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Number of retries after the initial attempt.
    pub retry_count: u32,
    /// Base delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
    pub backoff: Backoff,
    /// Maximum number of 401-triggered refreshes per logical request.
    pub max_reauth: u32,
    /// Refresh a JWT whose `exp` claim has passed before sending the request.
    pub refresh_expired_tokens: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            retry_count: 0,
            retry_delay_ms: 1_000,
            backoff: Backoff::Fixed,
            max_reauth: 1,
            refresh_expired_tokens: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Backoff, ClientOptions};

    #[test]
    fn defaults() {
        let opts = ClientOptions::default();
        assert_eq!(opts.timeout_ms, 5_000);
        assert_eq!(opts.retry_count, 0);
        assert_eq!(opts.retry_delay_ms, 1_000);
        assert_eq!(opts.backoff, Backoff::Fixed);
    }

    #[test]
    fn fixed_backoff_never_grows() {
        let base = Duration::from_millis(250);
        assert_eq!(Backoff::Fixed.delay(base, 0), base);
        assert_eq!(Backoff::Fixed.delay(base, 5), base);
    }

    #[test]
    fn exponential_backoff_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(Backoff::Exponential.delay(base, 0), Duration::from_millis(100));
        assert_eq!(Backoff::Exponential.delay(base, 3), Duration::from_millis(800));
    }
}
