use std::io;

use bytes::Bytes;
use futures_core::Stream;
use http::{HeaderMap, HeaderValue, Method, header::HeaderName};
use tokio_util::sync::CancellationToken;

use crate::{
    api::paginator::ListObjectsPaginator,
    client::{Client, Operation},
    error::{Error, Result},
    transport::request::RequestBody,
    types::{
        DeleteObjectOutput, GetObjectOutput, HeadObjectOutput, ListObjectsPage, OperationKind,
        PutObjectOutput,
    },
};

#[derive(Clone)]
pub struct ObjectsService {
    client: Client,
}

impl ObjectsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn get(&self, bucket: impl Into<String>, key: impl Into<String>) -> GetObjectRequest {
        GetObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            range: None,
            if_match: None,
            if_none_match: None,
            if_modified_since: None,
            if_unmodified_since: None,
            cancel: None,
        }
    }

    pub fn head(&self, bucket: impl Into<String>, key: impl Into<String>) -> HeadObjectRequest {
        HeadObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            cancel: None,
        }
    }

    pub fn put(&self, bucket: impl Into<String>, key: impl Into<String>) -> PutObjectRequest {
        PutObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            cache_control: None,
            content_md5: false,
            metadata: Vec::new(),
            body: RequestBody::Empty,
            content_length: None,
            idempotent: false,
            cancel: None,
        }
    }

    pub fn delete(&self, bucket: impl Into<String>, key: impl Into<String>) -> DeleteObjectRequest {
        DeleteObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            cancel: None,
        }
    }

    /// Lists a bucket's contents one page at a time (ListObjects, version 1).
    pub fn list(&self, bucket: impl Into<String>) -> ListObjectsRequest {
        ListObjectsRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            prefix: None,
            delimiter: None,
            marker: None,
            max_keys: None,
            cancel: None,
        }
    }
}

fn header_value(value: &str, label: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::invalid_config(format!("invalid {label} header")))
}

fn insert_optional(
    headers: &mut HeaderMap,
    name: HeaderName,
    value: Option<String>,
    label: &str,
) -> Result<()> {
    if let Some(value) = value {
        headers.insert(name, header_value(&value, label)?);
    }
    Ok(())
}

pub struct GetObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    range: Option<String>,
    if_match: Option<String>,
    if_none_match: Option<String>,
    if_modified_since: Option<String>,
    if_unmodified_since: Option<String>,
    cancel: Option<CancellationToken>,
}

impl GetObjectRequest {
    pub fn range_bytes(mut self, start: u64, end_inclusive: u64) -> Self {
        self.range = Some(format!("bytes={start}-{end_inclusive}"));
        self
    }

    pub fn if_match(mut self, value: impl Into<String>) -> Self {
        self.if_match = Some(value.into());
        self
    }

    pub fn if_none_match(mut self, value: impl Into<String>) -> Self {
        self.if_none_match = Some(value.into());
        self
    }

    pub fn if_modified_since(mut self, value: impl Into<String>) -> Self {
        self.if_modified_since = Some(value.into());
        self
    }

    pub fn if_unmodified_since(mut self, value: impl Into<String>) -> Self {
        self.if_unmodified_since = Some(value.into());
        self
    }

    /// Binds a token that aborts the request, and the returned body, when fired.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sends the request. The returned body is still attached to its connection.
    pub async fn send(self) -> Result<GetObjectOutput> {
        let mut headers = HeaderMap::new();
        insert_optional(&mut headers, http::header::RANGE, self.range, "Range")?;
        insert_optional(&mut headers, http::header::IF_MATCH, self.if_match, "If-Match")?;
        insert_optional(
            &mut headers,
            http::header::IF_NONE_MATCH,
            self.if_none_match,
            "If-None-Match",
        )?;
        insert_optional(
            &mut headers,
            http::header::IF_MODIFIED_SINCE,
            self.if_modified_since,
            "If-Modified-Since",
        )?;
        insert_optional(
            &mut headers,
            http::header::IF_UNMODIFIED_SINCE,
            self.if_unmodified_since,
            "If-Unmodified-Since",
        )?;

        let mut operation = Operation::new(OperationKind::GetObject, Method::GET)
            .bucket(&self.bucket)
            .key(&self.key);
        operation.headers = headers;
        operation.cancel = self.cancel;

        self.client.execute(operation).await?.try_into()
    }
}

pub struct HeadObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    cancel: Option<CancellationToken>,
}

impl HeadObjectRequest {
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn send(self) -> Result<HeadObjectOutput> {
        let mut operation = Operation::new(OperationKind::HeadObject, Method::HEAD)
            .bucket(&self.bucket)
            .key(&self.key);
        operation.cancel = self.cancel;

        self.client.execute(operation).await?.try_into()
    }
}

pub struct PutObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    content_type: Option<String>,
    cache_control: Option<String>,
    content_md5: bool,
    metadata: Vec<(String, String)>,
    body: RequestBody,
    content_length: Option<u64>,
    idempotent: bool,
    cancel: Option<CancellationToken>,
}

impl PutObjectRequest {
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    /// Sends a `Content-MD5` digest of the body. Only available for in-memory bodies.
    pub fn content_md5(mut self, enabled: bool) -> Self {
        self.content_md5 = enabled;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self.content_length = None;
        self
    }

    /// Uploads from a one-shot stream of exactly `content_length` bytes.
    ///
    /// The stream cannot be replayed, so the request is never retried; resubmit with a
    /// fresh stream after a failure.
    pub fn body_stream<S>(mut self, stream: S, content_length: u64) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, io::Error>> + Send + 'static,
    {
        self.body = RequestBody::Stream(Box::pin(stream));
        self.content_length = Some(content_length);
        self
    }

    /// Marks the upload safe to resend after a transient failure.
    ///
    /// Has no effect on streamed bodies.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn send(self) -> Result<PutObjectOutput> {
        let mut headers = HeaderMap::new();
        insert_optional(
            &mut headers,
            http::header::CONTENT_TYPE,
            self.content_type,
            "Content-Type",
        )?;
        insert_optional(
            &mut headers,
            http::header::CACHE_CONTROL,
            self.cache_control,
            "Cache-Control",
        )?;

        for (name, value) in self.metadata {
            let header_name = crate::util::headers::metadata_header_name(&name)?;
            headers.insert(header_name, header_value(&value, "metadata")?);
        }

        if self.content_md5 {
            headers.insert(
                crate::util::md5::CONTENT_MD5,
                crate::util::md5::body_digest(&self.body)?,
            );
        }

        if let Some(len) = self.content_length {
            headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from(len));
        }

        let mut operation = Operation::new(OperationKind::PutObject, Method::PUT)
            .bucket(&self.bucket)
            .key(&self.key);
        operation.headers = headers;
        operation.body = self.body;
        operation.idempotent = Some(self.idempotent);
        operation.cancel = self.cancel;

        self.client.execute(operation).await?.try_into()
    }
}

pub struct DeleteObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    cancel: Option<CancellationToken>,
}

impl DeleteObjectRequest {
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn send(self) -> Result<DeleteObjectOutput> {
        let mut operation = Operation::new(OperationKind::DeleteObject, Method::DELETE)
            .bucket(&self.bucket)
            .key(&self.key);
        operation.cancel = self.cancel;

        self.client.execute(operation).await?.try_into()
    }
}

/// One ListObjects request; also the template a [`ListObjectsPaginator`] clones per page.
#[derive(Clone)]
pub struct ListObjectsRequest {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    delimiter: Option<String>,
    marker: Option<String>,
    max_keys: Option<u32>,
    cancel: Option<CancellationToken>,
}

impl ListObjectsRequest {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Starts the listing after `marker`.
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    pub fn max_keys(mut self, max_keys: u32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn starting_marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    pub(crate) fn with_marker(mut self, marker: Option<String>) -> Self {
        self.marker = marker;
        self
    }

    fn query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(delimiter) = &self.delimiter {
            params.push(("delimiter".to_string(), delimiter.clone()));
        }
        if let Some(marker) = &self.marker {
            params.push(("marker".to_string(), marker.clone()));
        }
        if let Some(max_keys) = self.max_keys {
            params.push(("max-keys".to_string(), max_keys.to_string()));
        }
        if let Some(prefix) = &self.prefix {
            params.push(("prefix".to_string(), prefix.clone()));
        }
        params
    }

    /// Fetches a single page.
    pub async fn send(self) -> Result<ListObjectsPage> {
        let mut operation =
            Operation::new(OperationKind::ListObjects, Method::GET).bucket(&self.bucket);
        operation.query = self.query_params();
        operation.cancel = self.cancel.clone();

        self.client.execute(operation).await?.try_into()
    }

    /// Walks every page lazily, starting from this request's marker.
    pub fn paginator(self) -> ListObjectsPaginator {
        ListObjectsPaginator::new(self)
    }
}
