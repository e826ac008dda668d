use std::{io, pin::Pin};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::TryStreamExt as _;
use http::{HeaderMap, Method};
use http_body::Frame;
use http_body_util::{BodyExt as _, Full, StreamBody, combinators::UnsyncBoxBody};
use sha2::{Digest as _, Sha256};
use time::OffsetDateTime;

use crate::{error::Error, util::url::ResolvedUrl};

pub(crate) const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

pub(crate) type BodyStream =
    Pin<Box<dyn Stream<Item = std::result::Result<Bytes, io::Error>> + Send + 'static>>;

/// Body type handed to the HTTP connection.
pub(crate) type HttpBody = UnsyncBoxBody<Bytes, io::Error>;

pub(crate) enum RequestBody {
    Empty,
    Bytes(Bytes),
    /// One-shot caller stream. Never replayed.
    Stream(BodyStream),
}

impl RequestBody {
    pub(crate) fn is_replayable(&self) -> bool {
        matches!(self, Self::Empty | Self::Bytes(_))
    }

    pub(crate) fn clone_for_retry(&self) -> Option<Self> {
        match self {
            Self::Empty => Some(Self::Empty),
            Self::Bytes(b) => Some(Self::Bytes(b.clone())),
            Self::Stream(_) => None,
        }
    }

    /// Hex SHA-256 of a fixed payload, or the unsigned marker for streams.
    pub(crate) fn payload_hash(&self) -> String {
        match self {
            Self::Empty => hex::encode(Sha256::digest(b"")),
            Self::Bytes(b) => hex::encode(Sha256::digest(b)),
            Self::Stream(_) => UNSIGNED_PAYLOAD.to_string(),
        }
    }

    pub(crate) fn into_http_body(self) -> HttpBody {
        match self {
            Self::Empty => http_body_util::Empty::<Bytes>::new()
                .map_err(|never| match never {})
                .boxed_unsync(),
            Self::Bytes(b) => Full::new(b).map_err(|never| match never {}).boxed_unsync(),
            Self::Stream(stream) => StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync(),
        }
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A fully described, not yet signed request.
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) method: Method,
    pub(crate) url: ResolvedUrl,
    pub(crate) headers: HeaderMap,
    pub(crate) body: RequestBody,
    pub(crate) timestamp: OffsetDateTime,
    pub(crate) idempotent: bool,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        url: ResolvedUrl,
        mut headers: HeaderMap,
        body: RequestBody,
        timestamp: OffsetDateTime,
    ) -> Result<Self, Error> {
        headers.insert(
            http::header::HOST,
            crate::util::url::host_header_value(&url.url)?,
        );
        let idempotent = matches!(method, Method::GET | Method::HEAD | Method::DELETE);
        Ok(Self {
            method,
            url,
            headers,
            body,
            timestamp,
            idempotent,
        })
    }

    /// Marks the request safe to resend after a transient failure.
    pub(crate) fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }
}

/// A request whose header map is final, including `Authorization` when signed.
#[derive(Debug)]
pub(crate) struct SignedRequest {
    pub(crate) method: Method,
    pub(crate) url: ResolvedUrl,
    pub(crate) headers: HeaderMap,
    pub(crate) body: RequestBody,
    pub(crate) idempotent: bool,
}

impl SignedRequest {
    pub(crate) fn from_request(request: Request) -> Self {
        Self {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body: request.body,
            idempotent: request.idempotent,
        }
    }

    /// Attempts this request may consume under `max_attempts`.
    pub(crate) fn attempt_budget(&self, max_attempts: u32) -> u32 {
        if self.idempotent && self.body.is_replayable() {
            max_attempts.max(1)
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::{auth::AddressingStyle, util::url::resolve_url};

    fn request(method: Method, body: RequestBody) -> Request {
        let base = Url::parse("http://localhost:9000").unwrap();
        let url = resolve_url(&base, Some("b"), Some("k"), &[], AddressingStyle::Path).unwrap();
        Request::new(
            method,
            url,
            HeaderMap::new(),
            body,
            OffsetDateTime::UNIX_EPOCH,
        )
        .unwrap()
    }

    #[test]
    fn only_safe_methods_default_to_idempotent() {
        assert!(request(Method::GET, RequestBody::Empty).idempotent);
        assert!(request(Method::DELETE, RequestBody::Empty).idempotent);
        assert!(!request(Method::PUT, RequestBody::Empty).idempotent);
        assert!(!request(Method::POST, RequestBody::Empty).idempotent);
    }

    #[test]
    fn stream_bodies_get_a_single_attempt() {
        let stream: BodyStream = Box::pin(futures_util::stream::empty::<Result<Bytes, io::Error>>());
        let signed = SignedRequest::from_request(
            request(Method::PUT, RequestBody::Stream(stream)).idempotent(true),
        );
        assert_eq!(signed.attempt_budget(5), 1);

        let signed = SignedRequest::from_request(
            request(Method::PUT, RequestBody::Bytes(Bytes::from_static(b"x"))).idempotent(true),
        );
        assert_eq!(signed.attempt_budget(5), 5);
    }

    #[test]
    fn host_header_is_set_from_url() {
        let req = request(Method::GET, RequestBody::Empty);
        assert_eq!(req.headers.get(http::header::HOST).unwrap(), "localhost:9000");
    }

    #[test]
    fn payload_hash_of_empty_body() {
        assert_eq!(
            RequestBody::Empty.payload_hash(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
