use std::time::Duration;

pub(crate) mod body;
pub(crate) mod connection;
pub(crate) mod manager;
pub(crate) mod pool;
pub(crate) mod request;
pub(crate) mod response;

/// Retry budget applied to idempotent requests.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

pub(crate) fn backoff_delay(policy: RetryPolicy, attempt: u32) -> Duration {
    let attempt = attempt.saturating_sub(1);
    let factor = 1u32 << attempt.min(16);
    let millis = policy
        .base_delay
        .as_millis()
        .saturating_mul(u128::from(factor));
    let capped = millis.min(policy.max_delay.as_millis());

    let jitter = jitter_millis(capped);
    Duration::from_millis(jitter as u64)
}

fn jitter_millis(max_millis: u128) -> u128 {
    if max_millis <= 1 {
        return max_millis;
    }

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u128)
        .unwrap_or(0);

    // Full jitter, but never below half the window so backoff still grows.
    max_millis / 2 + nanos % (max_millis / 2 + 1)
}

#[cfg(feature = "metrics")]
pub(crate) fn status_class(status: http::StatusCode) -> &'static str {
    if status.is_informational() {
        "1xx"
    } else if status.is_success() {
        "2xx"
    } else if status.is_redirection() {
        "3xx"
    } else if status.is_client_error() {
        "4xx"
    } else if status.is_server_error() {
        "5xx"
    } else {
        "other"
    }
}

#[cfg(feature = "metrics")]
pub(crate) fn method_label(method: &http::Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "PUT" => "PUT",
        "HEAD" => "HEAD",
        "DELETE" => "DELETE",
        "POST" => "POST",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_within_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        for attempt in 1..=8 {
            assert!(backoff_delay(policy, attempt) <= Duration::from_millis(300));
        }
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        };
        assert!(backoff_delay(policy, 1) <= Duration::from_millis(100));
        assert!(backoff_delay(policy, 4) >= Duration::from_millis(400));
    }

    #[test]
    fn zero_delay_policy_does_not_sleep() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        assert_eq!(backoff_delay(policy, 3), Duration::ZERO);
    }
}
