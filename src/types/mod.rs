//! Read-only result views returned by operations.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::HeaderMap;
use time::OffsetDateTime;
use tokio::io::AsyncWrite;

use crate::{
    error::{Error, Result},
    transport::body::ObjectBody,
    util::headers::header_string,
};

pub use crate::transport::pool::PoolStats;

/// Fields every response carries, whatever the operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    request_id: Option<String>,
    host_id: Option<String>,
    etag: Option<String>,
    date: Option<String>,
}

impl ResponseMetadata {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: header_string(headers, "x-amz-request-id"),
            host_id: header_string(headers, "x-amz-id-2"),
            etag: header_string(headers, http::header::ETAG),
            date: header_string(headers, http::header::DATE),
        }
    }

    /// `x-amz-request-id`.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// `x-amz-id-2`, the extended request id.
    pub fn host_id(&self) -> Option<&str> {
        self.host_id.as_deref()
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Raw `Date` header.
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }
}

/// Fault document carried by a non-2xx response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ErrorDocument {
    pub(crate) code: String,
    pub(crate) message: Option<String>,
    pub(crate) request_id: Option<String>,
    pub(crate) host_id: Option<String>,
}

/// Bucket owner reported by a bucket listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Owner {
    id: Option<String>,
    display_name: Option<String>,
}

impl Owner {
    pub(crate) fn new(id: Option<String>, display_name: Option<String>) -> Self {
        Self { id, display_name }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketEntry {
    name: String,
    creation_date: OffsetDateTime,
}

impl BucketEntry {
    pub(crate) fn new(name: String, creation_date: OffsetDateTime) -> Self {
        Self {
            name,
            creation_date,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creation_date(&self) -> OffsetDateTime {
        self.creation_date
    }
}

/// One object in a listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    key: String,
    last_modified: OffsetDateTime,
    etag: Option<String>,
    size: u64,
    storage_class: Option<String>,
}

impl ObjectEntry {
    pub(crate) fn new(
        key: String,
        last_modified: OffsetDateTime,
        etag: Option<String>,
        size: u64,
        storage_class: Option<String>,
    ) -> Self {
        Self {
            key,
            last_modified,
            etag,
            size,
            storage_class,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn last_modified(&self) -> OffsetDateTime {
        self.last_modified
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn storage_class(&self) -> Option<&str> {
        self.storage_class.as_deref()
    }
}

/// An item yielded by the listing paginator, in key order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListEntry {
    Object(ObjectEntry),
    /// A key prefix rolled up by the delimiter.
    CommonPrefix(String),
}

impl ListEntry {
    /// The key or prefix this entry sorts by.
    pub fn key(&self) -> &str {
        match self {
            Self::Object(obj) => obj.key(),
            Self::CommonPrefix(prefix) => prefix,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CreateBucketOutput {
    metadata: ResponseMetadata,
    location: Option<String>,
}

impl CreateBucketOutput {
    pub(crate) fn new(metadata: ResponseMetadata, location: Option<String>) -> Self {
        Self { metadata, location }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// The `Location` header returned for the new bucket.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

#[derive(Clone, Debug)]
pub struct ListBucketsOutput {
    metadata: ResponseMetadata,
    owner: Option<Owner>,
    buckets: Vec<BucketEntry>,
}

impl ListBucketsOutput {
    pub(crate) fn new(
        metadata: ResponseMetadata,
        owner: Option<Owner>,
        buckets: Vec<BucketEntry>,
    ) -> Self {
        Self {
            metadata,
            owner,
            buckets,
        }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn buckets(&self) -> &[BucketEntry] {
        &self.buckets
    }

    pub fn into_buckets(self) -> Vec<BucketEntry> {
        self.buckets
    }
}

#[derive(Clone, Debug)]
pub struct DeleteBucketOutput {
    metadata: ResponseMetadata,
}

impl DeleteBucketOutput {
    pub(crate) fn new(metadata: ResponseMetadata) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }
}

/// One page of a `ListObjects` listing.
///
/// Objects and common prefixes are each in byte-wise key order.
#[derive(Clone, Debug)]
pub struct ListObjectsPage {
    metadata: ResponseMetadata,
    pub(crate) bucket: String,
    pub(crate) prefix: Option<String>,
    pub(crate) marker: Option<String>,
    pub(crate) delimiter: Option<String>,
    pub(crate) max_keys: Option<u32>,
    pub(crate) is_truncated: bool,
    pub(crate) next_marker: Option<String>,
    pub(crate) objects: Vec<ObjectEntry>,
    pub(crate) common_prefixes: Vec<String>,
}

impl ListObjectsPage {
    /// Builds a page from the parsed listing fields; metadata is attached by the caller.
    pub(crate) fn new(bucket: String) -> Self {
        Self {
            metadata: ResponseMetadata::default(),
            bucket,
            prefix: None,
            marker: None,
            delimiter: None,
            max_keys: None,
            is_truncated: false,
            next_marker: None,
            objects: Vec::new(),
            common_prefixes: Vec::new(),
        }
    }

    pub(crate) fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The marker this page was requested with.
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    pub fn max_keys(&self) -> Option<u32> {
        self.max_keys
    }

    pub fn is_truncated(&self) -> bool {
        self.is_truncated
    }

    /// Where the next page starts. Absent on the last page.
    pub fn next_marker(&self) -> Option<&str> {
        self.next_marker.as_deref()
    }

    pub fn objects(&self) -> &[ObjectEntry] {
        &self.objects
    }

    pub fn common_prefixes(&self) -> &[String] {
        &self.common_prefixes
    }

    /// Objects and common prefixes merged in key order.
    pub fn entries(&self) -> Vec<ListEntry> {
        merge_entries(self.objects.clone(), self.common_prefixes.clone())
    }

    pub(crate) fn into_entries(self) -> Vec<ListEntry> {
        merge_entries(self.objects, self.common_prefixes)
    }
}

fn merge_entries(objects: Vec<ObjectEntry>, prefixes: Vec<String>) -> Vec<ListEntry> {
    let mut out = Vec::with_capacity(objects.len() + prefixes.len());
    let mut objects = objects.into_iter().peekable();
    let mut prefixes = prefixes.into_iter().peekable();
    loop {
        let take_object = match (objects.peek(), prefixes.peek()) {
            (Some(obj), Some(prefix)) => obj.key.as_bytes() <= prefix.as_bytes(),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let entry = if take_object {
            objects.next().map(ListEntry::Object)
        } else {
            prefixes.next().map(ListEntry::CommonPrefix)
        };
        out.extend(entry);
    }
    out
}

#[derive(Clone, Debug)]
pub struct PutObjectOutput {
    metadata: ResponseMetadata,
    version_id: Option<String>,
}

impl PutObjectOutput {
    pub(crate) fn new(metadata: ResponseMetadata, version_id: Option<String>) -> Self {
        Self {
            metadata,
            version_id,
        }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn etag(&self) -> Option<&str> {
        self.metadata.etag()
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }
}

/// Object attributes shared by GET and HEAD responses.
#[derive(Clone, Debug, Default)]
pub struct ObjectAttributes {
    content_length: Option<u64>,
    content_type: Option<String>,
    last_modified: Option<String>,
    cache_control: Option<String>,
    user_metadata: BTreeMap<String, String>,
}

impl ObjectAttributes {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            content_length: crate::util::headers::header_u64(
                headers,
                http::header::CONTENT_LENGTH,
            ),
            content_type: header_string(headers, http::header::CONTENT_TYPE),
            last_modified: header_string(headers, http::header::LAST_MODIFIED),
            cache_control: header_string(headers, http::header::CACHE_CONTROL),
            user_metadata: crate::util::headers::user_metadata(headers),
        }
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Raw `Last-Modified` header.
    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    /// `x-amz-meta-*` headers keyed by their suffix.
    pub fn user_metadata(&self) -> &BTreeMap<String, String> {
        &self.user_metadata
    }
}

/// A GET response whose body has not been read yet.
#[derive(Debug)]
pub struct GetObjectOutput {
    metadata: ResponseMetadata,
    attributes: ObjectAttributes,
    body: ObjectBody,
}

impl GetObjectOutput {
    pub(crate) fn new(
        metadata: ResponseMetadata,
        attributes: ObjectAttributes,
        body: ObjectBody,
    ) -> Self {
        Self {
            metadata,
            attributes,
            body,
        }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn attributes(&self) -> &ObjectAttributes {
        &self.attributes
    }

    pub fn body_mut(&mut self) -> &mut ObjectBody {
        &mut self.body
    }

    pub fn into_body(self) -> ObjectBody {
        self.body
    }

    /// Collects the body into memory.
    pub async fn bytes(mut self) -> Result<Bytes> {
        self.body.bytes().await
    }

    /// Streams the body into `writer`.
    pub async fn write_to<W>(mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.body.write_to(writer).await
    }
}

#[derive(Clone, Debug)]
pub struct HeadObjectOutput {
    metadata: ResponseMetadata,
    attributes: ObjectAttributes,
}

impl HeadObjectOutput {
    pub(crate) fn new(metadata: ResponseMetadata, attributes: ObjectAttributes) -> Self {
        Self {
            metadata,
            attributes,
        }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn attributes(&self) -> &ObjectAttributes {
        &self.attributes
    }
}

#[derive(Clone, Debug)]
pub struct DeleteObjectOutput {
    metadata: ResponseMetadata,
}

impl DeleteObjectOutput {
    pub(crate) fn new(metadata: ResponseMetadata) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }
}

/// Selects how a successful response is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    CreateBucket,
    ListBuckets,
    DeleteBucket,
    ListObjects,
    PutObject,
    GetObject,
    HeadObject,
    DeleteObject,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateBucket => "CreateBucket",
            Self::ListBuckets => "ListBuckets",
            Self::DeleteBucket => "DeleteBucket",
            Self::ListObjects => "ListObjects",
            Self::PutObject => "PutObject",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::DeleteObject => "DeleteObject",
        }
    }
}

/// Parsed result of any operation.
#[derive(Debug)]
pub enum Output {
    CreateBucket(CreateBucketOutput),
    ListBuckets(ListBucketsOutput),
    DeleteBucket(DeleteBucketOutput),
    ListObjects(ListObjectsPage),
    PutObject(PutObjectOutput),
    GetObject(GetObjectOutput),
    HeadObject(HeadObjectOutput),
    DeleteObject(DeleteObjectOutput),
}

impl Output {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateBucket(_) => OperationKind::CreateBucket,
            Self::ListBuckets(_) => OperationKind::ListBuckets,
            Self::DeleteBucket(_) => OperationKind::DeleteBucket,
            Self::ListObjects(_) => OperationKind::ListObjects,
            Self::PutObject(_) => OperationKind::PutObject,
            Self::GetObject(_) => OperationKind::GetObject,
            Self::HeadObject(_) => OperationKind::HeadObject,
            Self::DeleteObject(_) => OperationKind::DeleteObject,
        }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        match self {
            Self::CreateBucket(out) => out.metadata(),
            Self::ListBuckets(out) => out.metadata(),
            Self::DeleteBucket(out) => out.metadata(),
            Self::ListObjects(out) => out.metadata(),
            Self::PutObject(out) => out.metadata(),
            Self::GetObject(out) => out.metadata(),
            Self::HeadObject(out) => out.metadata(),
            Self::DeleteObject(out) => out.metadata(),
        }
    }
}

macro_rules! impl_try_from_output {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl TryFrom<Output> for $ty {
                type Error = Error;

                fn try_from(output: Output) -> Result<Self> {
                    match output {
                        Output::$variant(out) => Ok(out),
                        other => Err(Error::malformed(
                            format!(
                                "expected {} output, got {}",
                                OperationKind::$variant.as_str(),
                                other.kind().as_str()
                            ),
                            None,
                        )),
                    }
                }
            }
        )*
    };
}

impl_try_from_output! {
    CreateBucket => CreateBucketOutput,
    ListBuckets => ListBucketsOutput,
    DeleteBucket => DeleteBucketOutput,
    ListObjects => ListObjectsPage,
    PutObject => PutObjectOutput,
    GetObject => GetObjectOutput,
    HeadObject => HeadObjectOutput,
    DeleteObject => DeleteObjectOutput,
}
