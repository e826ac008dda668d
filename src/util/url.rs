use std::net::IpAddr;

use http::HeaderValue;
use url::Url;

use crate::{
    auth::AddressingStyle,
    error::Error,
    util::encode::{self, Component},
};

/// Query parameters that name a sub-resource and therefore belong to the legacy
/// canonical resource.
const SUBRESOURCES: &[&str] = &[
    "acl",
    "cors",
    "delete",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

#[derive(Clone, Debug)]
pub(crate) struct ResolvedUrl {
    pub(crate) url: Url,
    pub(crate) canonical_uri: String,
    pub(crate) canonical_query_string: String,
    /// `/bucket/key` plus sub-resources, independent of addressing style.
    pub(crate) canonical_resource: String,
}

impl ResolvedUrl {
    /// Origin-form request target sent on the wire.
    pub(crate) fn request_target(&self) -> String {
        if self.canonical_query_string.is_empty() {
            self.canonical_uri.clone()
        } else {
            format!("{}?{}", self.canonical_uri, self.canonical_query_string)
        }
    }

    /// Identifies the connection pool a request is sent through.
    pub(crate) fn pool_key(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        let port = self.url.port_or_known_default().unwrap_or(80);
        format!("{}://{host}:{port}", self.url.scheme())
    }
}

pub(crate) fn resolve_url(
    base_url: &Url,
    bucket: Option<&str>,
    key: Option<&str>,
    query_params: &[(String, String)],
    addressing: AddressingStyle,
) -> Result<ResolvedUrl, Error> {
    let canonical_query_string = encode::canonical_query(query_params);
    let subresources = subresource_suffix(query_params);

    let mut url = base_url.clone();
    url.set_query(Some(canonical_query_string.as_str()).filter(|q| !q.is_empty()));

    let (canonical_uri, canonical_resource) = match bucket {
        None => ("/".to_string(), format!("/{subresources}")),
        Some(bucket) => {
            let host = base_url
                .host_str()
                .ok_or_else(|| Error::invalid_config("endpoint must include host"))?;
            let key = key.unwrap_or_default();

            if use_virtual_host(base_url, host, bucket, addressing)? {
                let uri = encode::percent_encode(&format!("/{key}"), Component::Path);
                let resource = format!(
                    "/{}{uri}{subresources}",
                    encode::percent_encode(bucket, Component::Value)
                );
                url.set_host(Some(&format!("{bucket}.{host}")))
                    .map_err(|_| Error::invalid_config("invalid endpoint host"))?;
                (uri, resource)
            } else {
                let raw = match key {
                    "" => format!("/{bucket}"),
                    key => format!("/{bucket}/{key}"),
                };
                let uri = encode::percent_encode(&raw, Component::Path);
                let resource = format!("{uri}{subresources}");
                (uri, resource)
            }
        }
    };
    url.set_path(&canonical_uri);

    Ok(ResolvedUrl {
        url,
        canonical_uri,
        canonical_query_string,
        canonical_resource,
    })
}

pub(crate) fn host_header_value(url: &Url) -> Result<HeaderValue, Error> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::invalid_config("endpoint must include host"))?;
    let default_port = match url.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    let host = match (url.port(), default_port) {
        (Some(port), Some(default)) if port != default => format!("{host}:{port}"),
        (Some(port), None) => format!("{host}:{port}"),
        _ => host.to_string(),
    };

    HeaderValue::from_str(&host).map_err(|_| Error::invalid_config("invalid host header value"))
}

fn subresource_suffix(query_params: &[(String, String)]) -> String {
    let mut items = query_params
        .iter()
        .filter(|(k, _)| SUBRESOURCES.contains(&k.as_str()))
        .collect::<Vec<_>>();
    if items.is_empty() {
        return String::new();
    }
    items.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::from("?");
    for (idx, (k, v)) in items.into_iter().enumerate() {
        if idx > 0 {
            out.push('&');
        }
        out.push_str(k);
        if !v.is_empty() {
            out.push('=');
            out.push_str(v);
        }
    }
    out
}

/// Decides whether `bucket` moves into the host name.
fn use_virtual_host(
    base_url: &Url,
    host: &str,
    bucket: &str,
    addressing: AddressingStyle,
) -> Result<bool, Error> {
    match addressing {
        AddressingStyle::Path => Ok(false),
        AddressingStyle::VirtualHosted if dns_compatible(bucket) => Ok(true),
        AddressingStyle::VirtualHosted => Err(Error::invalid_config(
            "bucket is not DNS compatible for virtual-hosted-style",
        )),
        AddressingStyle::Auto => {
            let literal_host = host == "localhost" || host.parse::<IpAddr>().is_ok();
            // Dotted buckets break wildcard certificates.
            let tls_dotted = base_url.scheme() == "https" && bucket.contains('.');
            Ok(!literal_host && !tls_dotted && dns_compatible(bucket))
        }
    }
}

fn dns_compatible(bucket: &str) -> bool {
    let edge = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    (3..=63).contains(&bucket.len())
        && bucket.chars().all(|c| edge(c) || c == '-' || c == '.')
        && bucket.starts_with(edge)
        && bucket.ends_with(edge)
        && !bucket.contains("..")
        && bucket.parse::<IpAddr>().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_style_keeps_bucket_in_path_and_resource() {
        let base = Url::parse("http://127.0.0.1:9000").unwrap();
        let resolved = resolve_url(
            &base,
            Some("my-bucket"),
            Some("a+b"),
            &[],
            AddressingStyle::Auto,
        )
        .unwrap();

        assert_eq!(resolved.canonical_uri, "/my-bucket/a%2Bb");
        assert_eq!(resolved.canonical_resource, "/my-bucket/a%2Bb");
        assert_eq!(resolved.request_target(), "/my-bucket/a%2Bb");
        assert_eq!(resolved.pool_key(), "http://127.0.0.1:9000");
    }

    #[test]
    fn virtual_hosted_resource_still_names_bucket() {
        let base = Url::parse("https://s3.example.com").unwrap();
        let resolved = resolve_url(
            &base,
            Some("mybucket"),
            None,
            &[("prefix".to_string(), "logs/".to_string())],
            AddressingStyle::VirtualHosted,
        )
        .unwrap();

        assert_eq!(resolved.url.host_str().unwrap(), "mybucket.s3.example.com");
        assert_eq!(resolved.canonical_uri, "/");
        assert_eq!(resolved.canonical_resource, "/mybucket/");
        assert_eq!(resolved.request_target(), "/?prefix=logs%2F");
        assert_eq!(resolved.pool_key(), "https://mybucket.s3.example.com:443");
    }

    #[test]
    fn subresources_are_sorted_and_listing_params_left_out() {
        let base = Url::parse("http://localhost:9000").unwrap();
        let resolved = resolve_url(
            &base,
            Some("bucket"),
            None,
            &[
                ("versioning".to_string(), String::new()),
                ("delimiter".to_string(), "/".to_string()),
                ("acl".to_string(), String::new()),
            ],
            AddressingStyle::Path,
        )
        .unwrap();

        assert_eq!(resolved.canonical_resource, "/bucket?acl&versioning");
    }

    #[test]
    fn auto_falls_back_to_path_style_for_dot_bucket_on_https() {
        let base = Url::parse("https://s3.example.com").unwrap();
        let resolved = resolve_url(
            &base,
            Some("bucket.with.dots"),
            Some("key"),
            &[],
            AddressingStyle::Auto,
        )
        .unwrap();

        assert_eq!(resolved.url.host_str().unwrap(), "s3.example.com");
        assert_eq!(resolved.canonical_uri, "/bucket.with.dots/key");
    }

    #[test]
    fn host_header_omits_default_port() {
        let url = Url::parse("https://s3.example.com:443/x").unwrap();
        assert_eq!(host_header_value(&url).unwrap(), "s3.example.com");
        let url = Url::parse("http://localhost:9000/x").unwrap();
        assert_eq!(host_header_value(&url).unwrap(), "localhost:9000");
    }
}
