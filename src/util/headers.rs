use std::collections::BTreeMap;

use http::{
    HeaderMap,
    header::{AsHeaderName, HeaderName},
};

use crate::error::Error;

const META_PREFIX: &str = "x-amz-meta-";

pub(crate) fn header_string<N>(headers: &HeaderMap, name: N) -> Option<String>
where
    N: AsHeaderName,
{
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

pub(crate) fn header_u64<N>(headers: &HeaderMap, name: N) -> Option<u64>
where
    N: AsHeaderName,
{
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

/// Collects `x-amz-meta-*` headers keyed by the suffix after the prefix.
pub(crate) fn user_metadata(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(META_PREFIX)?;
            let value = value.to_str().ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Header name carrying the user metadata entry `key`. Names travel lowercased.
pub(crate) fn metadata_header_name(key: &str) -> Result<HeaderName, Error> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::invalid_config("metadata key must not be empty"));
    }

    HeaderName::try_from(format!("{META_PREFIX}{}", key.to_ascii_lowercase()))
        .map_err(|_| Error::invalid_config(format!("invalid metadata key {key:?}")))
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn collects_user_metadata_by_suffix() {
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-meta-owner", HeaderValue::from_static("ops"));
        headers.insert("x-amz-request-id", HeaderValue::from_static("r1"));
        headers.insert("content-length", HeaderValue::from_static("12"));

        let meta = user_metadata(&headers);
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("owner").map(String::as_str), Some("ops"));
        assert_eq!(header_u64(&headers, "content-length"), Some(12));
        assert_eq!(header_string(&headers, "x-amz-request-id").as_deref(), Some("r1"));
    }

    #[test]
    fn metadata_keys_are_prefixed_and_lowercased() {
        let name = metadata_header_name(" Owner ").unwrap();
        assert_eq!(name.as_str(), "x-amz-meta-owner");

        assert!(metadata_header_name("  ").is_err());
        assert!(metadata_header_name("two words").is_err());
    }
}
