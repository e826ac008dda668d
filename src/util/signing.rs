use base64::Engine as _;
use hmac::{Hmac, Mac as _};
use http::{HeaderMap, HeaderValue, Method};
use sha1::Sha1;
use sha2::{Digest as _, Sha256};
use time::{OffsetDateTime, UtcOffset, macros::format_description};

use crate::{
    auth::{Credentials, Region, SignatureVersion},
    error::Error,
    transport::request::{Request, SignedRequest},
};

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

const SERVICE: &str = "s3";

/// Computes the `Authorization` header for outgoing requests.
///
/// Stateless apart from its configuration; every request is signed from scratch.
#[derive(Clone, Debug)]
pub(crate) struct RequestSigner {
    region: Region,
    version: SignatureVersion,
}

impl RequestSigner {
    pub(crate) fn new(region: Region, version: SignatureVersion) -> Self {
        Self { region, version }
    }

    /// Signs `request` with `credentials`; `None` passes it through unsigned.
    pub(crate) fn sign(
        &self,
        mut request: Request,
        credentials: Option<&Credentials>,
    ) -> Result<SignedRequest, Error> {
        let Some(credentials) = credentials else {
            return Ok(SignedRequest::from_request(request));
        };

        match self.version {
            SignatureVersion::V4 => sign_v4(&mut request, &self.region, credentials)?,
            SignatureVersion::V2 => sign_v2(&mut request, credentials)?,
        }
        Ok(SignedRequest::from_request(request))
    }
}

fn sign_v4(request: &mut Request, region: &Region, credentials: &Credentials) -> Result<(), Error> {
    let now = request.timestamp.to_offset(UtcOffset::UTC);
    let date = date_stamp(now)?;
    let amz_date = amz_datetime(now)?;
    let scope = credential_scope(region, &date);

    let payload_hash = request.body.payload_hash();
    set_amz_headers(&mut request.headers, &payload_hash, credentials, &amz_date)?;

    let (canonical_headers, signed_headers) = canonicalize_headers(&request.headers);
    let canonical_request = canonical_request(
        &request.method,
        &request.url.canonical_uri,
        &request.url.canonical_query_string,
        &canonical_headers,
        &signed_headers,
        &payload_hash,
    );

    let string_to_sign = string_to_sign(&amz_date, &scope, &canonical_request);
    let signature = signature(credentials, region, &date, &string_to_sign)?;

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        credentials.access_key_id, scope, signed_headers,
        signature
    );
    let value = HeaderValue::from_str(&authorization)
        .map_err(|_| Error::signing("invalid authorization header value"))?;
    request.headers.insert(http::header::AUTHORIZATION, value);

    Ok(())
}

fn sign_v2(request: &mut Request, credentials: &Credentials) -> Result<(), Error> {
    let date = HeaderValue::from_str(&http_date(request.timestamp)?)
        .map_err(|_| Error::signing("invalid date header value"))?;
    request.headers.insert(http::header::DATE, date);

    if let Some(token) = &credentials.session_token {
        let token = HeaderValue::from_str(token)
            .map_err(|_| Error::signing("invalid x-amz-security-token header value"))?;
        request.headers.insert("x-amz-security-token", token);
    }

    let string_to_sign = v2_string_to_sign(
        &request.method,
        &request.headers,
        &request.url.canonical_resource,
    );
    let signature = v2_signature(&credentials.secret_access_key, &string_to_sign)?;

    let value = HeaderValue::from_str(&format!(
        "AWS {}:{}",
        credentials.access_key_id, signature
    ))
    .map_err(|_| Error::signing("invalid authorization header value"))?;
    request.headers.insert(http::header::AUTHORIZATION, value);

    Ok(())
}

fn v2_string_to_sign(method: &Method, headers: &HeaderMap, canonical_resource: &str) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    };

    let mut amz = headers
        .keys()
        .map(|name| name.as_str())
        .filter(|name| name.starts_with("x-amz-"))
        .map(|name| {
            let values = headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(normalize_header_value)
                .collect::<Vec<_>>()
                .join(",");
            format!("{name}:{values}\n")
        })
        .collect::<Vec<_>>();
    amz.sort();

    format!(
        "{method}\n{}\n{}\n{}\n{}{canonical_resource}",
        header("content-md5"),
        header("content-type"),
        header("date"),
        amz.concat()
    )
}

fn v2_signature(secret: &str, string_to_sign: &str) -> Result<String, Error> {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| Error::signing("invalid HMAC key"))?;
    mac.update(string_to_sign.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

fn set_amz_headers(
    headers: &mut HeaderMap,
    payload_hash: &str,
    credentials: &Credentials,
    amz_date: &str,
) -> Result<(), Error> {
    let amz_date = HeaderValue::from_str(amz_date)
        .map_err(|_| Error::signing("invalid x-amz-date header value"))?;
    headers.insert("x-amz-date", amz_date);

    let payload_hash = HeaderValue::from_str(payload_hash)
        .map_err(|_| Error::signing("invalid x-amz-content-sha256 header value"))?;
    headers.insert("x-amz-content-sha256", payload_hash);

    if let Some(token) = &credentials.session_token {
        let token = HeaderValue::from_str(token)
            .map_err(|_| Error::signing("invalid x-amz-security-token header value"))?;
        headers.insert("x-amz-security-token", token);
    }

    Ok(())
}

fn canonicalize_headers(headers: &HeaderMap) -> (String, String) {
    let mut pairs = headers
        .keys()
        .map(|name| name.as_str())
        .filter(|name| should_sign_header(name))
        .map(|name| {
            let value = headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(normalize_header_value)
                .collect::<Vec<_>>()
                .join(",");
            (name.to_ascii_lowercase(), value)
        })
        .collect::<Vec<_>>();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut canonical_headers = String::new();
    let mut signed_headers = String::new();
    for (idx, (name, value)) in pairs.into_iter().enumerate() {
        canonical_headers.push_str(&name);
        canonical_headers.push(':');
        canonical_headers.push_str(&value);
        canonical_headers.push('\n');

        if idx > 0 {
            signed_headers.push(';');
        }
        signed_headers.push_str(&name);
    }

    (canonical_headers, signed_headers)
}

fn should_sign_header(name: &str) -> bool {
    match name {
        "host"
        | "content-type"
        | "content-md5"
        | "range"
        | "if-match"
        | "if-none-match"
        | "if-modified-since"
        | "if-unmodified-since" => true,
        _ => name.starts_with("x-amz-"),
    }
}

fn normalize_header_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_ws = false;
    for c in value.trim().chars() {
        if c.is_whitespace() {
            in_ws = true;
            continue;
        }
        if in_ws && !out.is_empty() {
            out.push(' ');
        }
        in_ws = false;
        out.push(c);
    }
    out
}

fn canonical_request(
    method: &Method,
    canonical_uri: &str,
    canonical_query_string: &str,
    canonical_headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    format!(
        "{method}\n{canonical_uri}\n{canonical_query_string}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    )
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    let hashed = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    format!("AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{hashed}")
}

fn signature(
    credentials: &Credentials,
    region: &Region,
    date: &str,
    string_to_sign: &str,
) -> Result<String, Error> {
    let k_date = hmac_sha256(
        format!("AWS4{}", credentials.secret_access_key).as_bytes(),
        date.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, region.as_str().as_bytes())?;
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
    let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
    let sig = hmac_sha256(&k_signing, string_to_sign.as_bytes())?;
    Ok(hex::encode(sig))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| Error::signing("invalid HMAC key"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn date_stamp(now: OffsetDateTime) -> Result<String, Error> {
    now.format(format_description!("[year][month][day]"))
        .map_err(|_| Error::signing("failed to format signing date"))
}

fn amz_datetime(now: OffsetDateTime) -> Result<String, Error> {
    now.format(format_description!(
        "[year][month][day]T[hour][minute][second]Z"
    ))
    .map_err(|_| Error::signing("failed to format x-amz-date"))
}

/// RFC 7231 IMF-fixdate, e.g. `Fri, 24 May 2013 00:00:00 GMT`.
fn http_date(now: OffsetDateTime) -> Result<String, Error> {
    now.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))
        .map_err(|_| Error::signing("failed to format date header"))
}

fn credential_scope(region: &Region, date: &str) -> String {
    format!("{date}/{}/{SERVICE}/aws4_request", region.as_str())
}
