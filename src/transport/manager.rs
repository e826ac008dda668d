use std::{error::Error as StdError, time::Duration};

#[cfg(feature = "tracing")]
use tracing::Instrument as _;

use http::StatusCode;
use hyper::body::Incoming;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    transport::{
        RetryPolicy, backoff_delay,
        body::ObjectBody,
        connection::{Connector, HttpConnection},
        pool::{Checkout, Pool, PoolConfig, PoolStats, Pooled},
        request::{HttpBody, RequestBody, SignedRequest},
        response::RawResponse,
    },
    util::headers::header_u64,
};

/// Why one attempt failed, and whether another may help.
struct Failure {
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    retryable: bool,
}

impl Failure {
    fn retryable(message: impl Into<String>, source: Option<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            message: message.into(),
            source,
            retryable: true,
        }
    }

    fn fatal(message: impl Into<String>, source: Option<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            message: message.into(),
            source,
            retryable: false,
        }
    }

    fn from_connect(err: Error) -> Self {
        match err {
            Error::Transport {
                message, source, ..
            } => Self::retryable(message, source),
            other => Self::fatal(other.to_string(), Some(Box::new(other))),
        }
    }

    fn from_send(err: hyper::Error) -> Self {
        if err.is_parse() {
            return Self::fatal("invalid HTTP response", Some(Box::new(err)));
        }
        if err.is_user() {
            return Self::fatal("request could not be sent", Some(Box::new(err)));
        }
        Self::retryable("request failed", Some(Box::new(err)))
    }

    fn into_error(self, attempts: u32) -> Error {
        Error::Transport {
            message: self.message,
            attempts,
            source: self.source,
        }
    }
}

/// Owns the connection pool and drives each request through its retry budget.
pub(crate) struct ConnectionManager {
    pool: Pool<HttpConnection>,
    connector: Connector,
    request_timeout: Option<Duration>,
}

impl ConnectionManager {
    pub(crate) fn new(
        pool: PoolConfig,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        Ok(Self {
            pool: Pool::new(pool),
            connector: Connector::new(connect_timeout)?,
            request_timeout,
        })
    }

    pub(crate) fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Sends `request`, retrying transient failures when the request allows it.
    ///
    /// A 5xx still present after the last attempt is returned as a response, not an error,
    /// so the classifier sees the service's fault document.
    pub(crate) async fn execute(
        &self,
        request: SignedRequest,
        retry: &RetryPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse> {
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::Cancelled),
                    result = self.run(request, *retry, Some(token.clone())) => result,
                }
            }
            None => self.run(request, *retry, None).await,
        }
    }

    async fn run(
        &self,
        request: SignedRequest,
        retry: RetryPolicy,
        cancel: Option<CancellationToken>,
    ) -> Result<RawResponse> {
        let max_attempts = request.attempt_budget(retry.max_attempts);
        let SignedRequest {
            method,
            url,
            headers,
            body,
            ..
        } = request;
        let origin = url.pool_key();
        let target = url.request_target();
        let mut body = Some(body);

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            #[cfg(feature = "metrics")]
            metrics::counter!(
                "s3_http_attempts_total",
                "method" => crate::transport::method_label(&method)
            )
            .increment(1);

            let attempt_body = match body.as_ref().and_then(RequestBody::clone_for_retry) {
                Some(replay) => replay,
                None => body.take().unwrap_or(RequestBody::Empty),
            };
            let mut http_request = http::Request::builder()
                .method(method.clone())
                .uri(target.as_str())
                .body(attempt_body.into_http_body())
                .map_err(|e| Error::invalid_config(format!("invalid request: {e}")))?;
            *http_request.headers_mut() = headers.clone();

            let sent = self.attempt(&origin, http_request);
            #[cfg(feature = "tracing")]
            let sent = sent.instrument(tracing::debug_span!(
                "s3.http",
                method = %method,
                host = url.url.host_str().unwrap_or(""),
                path = url.canonical_uri.as_str(),
                attempt,
            ));

            match sent.await {
                Ok((response, conn)) => {
                    let status = response.status();

                    #[cfg(feature = "metrics")]
                    metrics::counter!(
                        "s3_http_responses_total",
                        "method" => crate::transport::method_label(&method),
                        "class" => crate::transport::status_class(status),
                    )
                    .increment(1);

                    let raw = into_raw(response, conn, cancel.clone());
                    if should_retry_status(status) && attempt < max_attempts {
                        let mut body = raw.body;
                        // Short bodies are drained for reuse; anything else closes the connection.
                        let _ = body.discard().await;
                        self.backoff(&retry, attempt, "status").await;
                        continue;
                    }
                    return Ok(raw);
                }
                Err(failure) => {
                    if failure.retryable && attempt < max_attempts {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            attempt,
                            error = %failure.message,
                            "retrying after transport failure"
                        );
                        self.backoff(&retry, attempt, "transport").await;
                        continue;
                    }

                    #[cfg(feature = "metrics")]
                    metrics::counter!(
                        "s3_http_errors_total",
                        "method" => crate::transport::method_label(&method),
                        "kind" => "transport"
                    )
                    .increment(1);
                    return Err(failure.into_error(attempt));
                }
            }
        }
    }

    async fn attempt(
        &self,
        origin: &str,
        request: http::Request<HttpBody>,
    ) -> std::result::Result<(http::Response<Incoming>, Pooled<HttpConnection>), Failure> {
        let mut conn = self.checkout(origin).await?;

        let sent = conn.get_mut().send(request);
        let response = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, sent)
                .await
                .map_err(|_| Failure::retryable("request timed out", None))?,
            None => sent.await,
        }
        .map_err(Failure::from_send)?;

        Ok((response, conn))
    }

    /// Checks out a usable connection, replacing stale idle ones without spending an attempt.
    async fn checkout(
        &self,
        origin: &str,
    ) -> std::result::Result<Pooled<HttpConnection>, Failure> {
        loop {
            match self.pool.checkout(origin).await.map_err(Failure::from_connect)? {
                Checkout::Reused(mut pooled) => {
                    if pooled.get_mut().ready().await.is_ok() {
                        return Ok(pooled);
                    }
                    #[cfg(feature = "tracing")]
                    tracing::debug!(pool = origin, "discarding stale pooled connection");
                }
                Checkout::Vacant(vacancy) => {
                    let conn = self
                        .connector
                        .connect(vacancy.key())
                        .await
                        .map_err(Failure::from_connect)?;
                    return Ok(vacancy.fill(conn));
                }
            }
        }
    }

    async fn backoff(&self, retry: &RetryPolicy, attempt: u32, _reason: &'static str) {
        #[cfg(feature = "metrics")]
        metrics::counter!("s3_http_retries_total", "reason" => _reason).increment(1);
        tokio::time::sleep(backoff_delay(*retry, attempt)).await;
    }
}

fn into_raw(
    response: http::Response<Incoming>,
    conn: Pooled<HttpConnection>,
    cancel: Option<CancellationToken>,
) -> RawResponse {
    let (parts, incoming) = response.into_parts();
    let content_length = header_u64(&parts.headers, http::header::CONTENT_LENGTH);
    RawResponse {
        status: parts.status,
        headers: parts.headers,
        body: ObjectBody::new(incoming, conn, cancel, content_length),
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_500_and_503_are_retried() {
        assert!(should_retry_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(should_retry_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!should_retry_status(StatusCode::NOT_IMPLEMENTED));
        assert!(!should_retry_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn exhausted_failure_reports_attempts() {
        let err = Failure::retryable("connection reset", None).into_error(3);
        assert_eq!(err.attempts(), Some(3));
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn non_transport_connect_errors_are_fatal() {
        let failure = Failure::from_connect(Error::invalid_config("bad origin"));
        assert!(!failure.retryable);
        let failure = Failure::from_connect(Error::transport("refused", None));
        assert!(failure.retryable);
    }
}
