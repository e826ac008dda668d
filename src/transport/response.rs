use http::{HeaderMap, Method, StatusCode};

use crate::{
    error::{Error, ErrorKind},
    transport::body::{MAX_DRAIN, ObjectBody},
    util::headers::header_string,
};

const MAX_FAULT_SNIPPET: usize = 4096;

/// Status, headers and the not yet consumed body of one HTTP exchange.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: ObjectBody,
}

/// Passes 2xx responses through and turns everything else into a classified service error.
///
/// Short fault bodies are drained so the connection can return to the pool.
pub(crate) async fn classify(raw: RawResponse, method: &Method) -> Result<RawResponse, Error> {
    if raw.status.as_u16() < 300 {
        return Ok(raw);
    }
    Err(service_error(raw, method).await)
}

async fn service_error(raw: RawResponse, method: &Method) -> Error {
    let RawResponse {
        status,
        headers,
        mut body,
    } = raw;

    let request_id = header_string(&headers, "x-amz-request-id");
    let host_id = header_string(&headers, "x-amz-id-2");

    let payload = body.prefix(MAX_DRAIN).await.unwrap_or_default();
    let text = String::from_utf8_lossy(&payload);
    let body_snippet = (!text.trim().is_empty())
        .then(|| snippet(&text, MAX_FAULT_SNIPPET));

    let error = match crate::util::xml::parse_error_document(&text) {
        Some(doc) => Error::Service {
            kind: ErrorKind::from_code(&doc.code),
            status,
            code: Some(doc.code),
            message: doc.message,
            request_id: doc.request_id.or(request_id),
            host_id: doc.host_id.or(host_id),
            body_snippet,
        },
        None => Error::Service {
            kind: if status == StatusCode::NOT_FOUND && *method == Method::HEAD {
                ErrorKind::NotFound
            } else {
                ErrorKind::from_status(status)
            },
            status,
            code: None,
            message: None,
            request_id,
            host_id,
            body_snippet,
        },
    };

    #[cfg(feature = "metrics")]
    metrics::counter!(
        "s3_http_errors_total",
        "kind" => error.kind().map(ErrorKind::as_str).unwrap_or("service")
    )
    .increment(1);

    error
}

/// Cuts `text` to at most `limit` bytes on a char boundary.
fn snippet(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_respects_char_boundaries() {
        assert_eq!(snippet("short", 16), "short");
        assert_eq!(snippet("abcdefgh", 4), "abcd...");
        // 'é' is two bytes; a cut at 3 would split it.
        assert_eq!(snippet("abéd", 3), "ab...");
    }
}
