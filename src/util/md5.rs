use base64::Engine as _;
use http::{HeaderName, HeaderValue};
use md5::Digest as _;

use crate::{Result, error::Error, transport::request::RequestBody};

pub(crate) const CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");

/// Base64 MD5 digest of `bytes`, ready for a `Content-MD5` header.
pub(crate) fn digest_header(bytes: &[u8]) -> Result<HeaderValue> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(md5::Md5::digest(bytes));
    HeaderValue::try_from(encoded).map_err(|_| Error::invalid_config("invalid Content-MD5 header"))
}

/// Digest of a request body. Streams are read once, so they cannot be hashed up front.
pub(crate) fn body_digest(body: &RequestBody) -> Result<HeaderValue> {
    match body {
        RequestBody::Empty => digest_header(b""),
        RequestBody::Bytes(bytes) => digest_header(bytes),
        RequestBody::Stream(_) => Err(Error::invalid_config(
            "Content-MD5 requires an in-memory body",
        )),
    }
}
