//! Event-driven parsers for the service's XML documents.
//!
//! Documents are walked with `quick_xml`'s pull reader; element names are matched on raw
//! local-name bytes and text is moved out of a reusable buffer, so no DOM is ever built.

use bytes::Bytes;
use quick_xml::{Reader, events::Event};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    error::Error,
    types::{BucketEntry, ErrorDocument, ListObjectsPage, ObjectEntry, Owner},
};

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Parsed `ListAllMyBucketsResult`.
#[derive(Debug)]
pub(crate) struct BucketList {
    pub(crate) owner: Option<Owner>,
    pub(crate) buckets: Vec<BucketEntry>,
}

/// Parses an `<Error>` document. Anything else, including an empty body, yields `None`.
pub(crate) fn parse_error_document(body: &str) -> Option<ErrorDocument> {
    if body.trim().is_empty() {
        return None;
    }

    let mut reader = Reader::from_str(body);
    let mut text = String::new();
    let mut depth = 0usize;
    let mut doc = ErrorDocument::default();
    let mut saw_root = false;

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() != b"Error" {
                        return None;
                    }
                    saw_root = true;
                }
                depth += 1;
                text.clear();
            }
            Event::Text(e) => text.push_str(&e.unescape().ok()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    let value = std::mem::take(&mut text);
                    match e.local_name().as_ref() {
                        b"Code" => doc.code = value.trim().to_string(),
                        b"Message" => doc.message = non_empty(value),
                        b"RequestId" => doc.request_id = non_empty(value),
                        b"HostId" => doc.host_id = non_empty(value),
                        _ => {}
                    }
                }
            }
            Event::Empty(e) if depth == 0 && e.local_name().as_ref() != b"Error" => return None,
            Event::Eof => break,
            _ => {}
        }
    }

    (saw_root && !doc.code.is_empty()).then_some(doc)
}

pub(crate) fn parse_list_buckets(body: &[u8]) -> Result<BucketList, Error> {
    let mut reader = Reader::from_reader(body);
    let mut text = String::new();
    let mut path: Vec<Vec<u8>> = Vec::new();

    let mut owner: Option<Owner> = None;
    let mut owner_id = None;
    let mut owner_name = None;
    let mut buckets = Vec::new();
    let mut name: Option<String> = None;
    let mut created: Option<OffsetDateTime> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event().map_err(xml_error("ListAllMyBucketsResult"))? {
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                if path.is_empty() {
                    if local != b"ListAllMyBucketsResult" {
                        return Err(unexpected_root("ListAllMyBucketsResult", &local));
                    }
                    saw_root = true;
                }
                if local == b"Bucket" {
                    name = None;
                    created = None;
                }
                path.push(local);
                text.clear();
            }
            Event::Text(e) => {
                text.push_str(&e.unescape().map_err(xml_error("ListAllMyBucketsResult"))?);
            }
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(_) => {
                let Some(local) = path.pop() else {
                    return Err(Error::malformed("unbalanced ListAllMyBucketsResult", None));
                };
                let parent = path.last().map(Vec::as_slice);
                let value = std::mem::take(&mut text);
                match (parent, local.as_slice()) {
                    (Some(b"Owner"), b"ID") => owner_id = non_empty(value),
                    (Some(b"Owner"), b"DisplayName") => owner_name = non_empty(value),
                    (_, b"Owner") => {
                        owner = Some(Owner::new(owner_id.take(), owner_name.take()));
                    }
                    (Some(b"Bucket"), b"Name") => name = Some(value),
                    (Some(b"Bucket"), b"CreationDate") => {
                        created = Some(parse_timestamp("CreationDate", &value)?);
                    }
                    (_, b"Bucket") => {
                        let (Some(n), Some(c)) = (name.take(), created.take()) else {
                            return Err(Error::malformed(
                                "bucket entry is missing Name or CreationDate",
                                None,
                            ));
                        };
                        buckets.push(BucketEntry::new(n, c));
                    }
                    _ => {}
                }
            }
            Event::Empty(e) if path.is_empty() => {
                let local = e.local_name().as_ref().to_vec();
                if local != b"ListAllMyBucketsResult" {
                    return Err(unexpected_root("ListAllMyBucketsResult", &local));
                }
                return Ok(BucketList {
                    owner: None,
                    buckets,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::malformed("empty ListAllMyBucketsResult response", None));
    }
    if !path.is_empty() {
        return Err(Error::malformed("truncated ListAllMyBucketsResult", None));
    }
    Ok(BucketList { owner, buckets })
}

/// Parses a `ListBucketResult` (list objects, version 1) page.
///
/// When the page is truncated but the service omitted `NextMarker`, the marker falls back
/// to the greatest key or common prefix on the page.
pub(crate) fn parse_list_objects(body: &[u8]) -> Result<ListObjectsPage, Error> {
    let mut reader = Reader::from_reader(body);
    let mut text = String::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;

    let mut page = ListObjectsPage::new(String::new());
    let mut object = PartialObject::default();

    loop {
        match reader.read_event().map_err(xml_error("ListBucketResult"))? {
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                if path.is_empty() {
                    if local != b"ListBucketResult" {
                        return Err(unexpected_root("ListBucketResult", &local));
                    }
                    saw_root = true;
                }
                if local == b"Contents" {
                    object = PartialObject::default();
                }
                path.push(local);
                text.clear();
            }
            Event::Text(e) => {
                text.push_str(&e.unescape().map_err(xml_error("ListBucketResult"))?);
            }
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(_) => {
                let Some(local) = path.pop() else {
                    return Err(Error::malformed("unbalanced ListBucketResult", None));
                };
                let parent = path.last().map(Vec::as_slice);
                let value = std::mem::take(&mut text);
                match (parent, local.as_slice()) {
                    (Some(b"ListBucketResult"), field) => {
                        apply_listing_field(&mut page, &mut object, field, value)?;
                    }
                    (Some(b"Contents"), b"Key") => object.key = Some(value),
                    (Some(b"Contents"), b"LastModified") => {
                        object.last_modified = Some(parse_timestamp("LastModified", &value)?);
                    }
                    (Some(b"Contents"), b"ETag") => object.etag = non_empty(value),
                    (Some(b"Contents"), b"Size") => {
                        object.size = Some(parse_number("Size", &value)?);
                    }
                    (Some(b"Contents"), b"StorageClass") => object.storage_class = non_empty(value),
                    (Some(b"CommonPrefixes"), b"Prefix") => page.common_prefixes.push(value),
                    _ => {}
                }
            }
            Event::Empty(e) if path.is_empty() => {
                let local = e.local_name().as_ref().to_vec();
                return Err(unexpected_root("ListBucketResult", &local));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::malformed("empty ListBucketResult response", None));
    }
    if !path.is_empty() {
        return Err(Error::malformed("truncated ListBucketResult", None));
    }

    if !page.is_truncated {
        page.next_marker = None;
    } else if page.next_marker.is_none() {
        let last_key = page.objects.last().map(ObjectEntry::key);
        let last_prefix = page.common_prefixes.last().map(String::as_str);
        page.next_marker = last_key.max(last_prefix).map(str::to_string);
    }
    Ok(page)
}

fn apply_listing_field(
    page: &mut ListObjectsPage,
    object: &mut PartialObject,
    field: &[u8],
    value: String,
) -> Result<(), Error> {
    match field {
        b"Name" => page.bucket = value,
        b"Prefix" => page.prefix = non_empty(value),
        b"Marker" => page.marker = non_empty(value),
        b"NextMarker" => page.next_marker = non_empty(value),
        b"Delimiter" => page.delimiter = non_empty(value),
        b"MaxKeys" => page.max_keys = Some(parse_number("MaxKeys", &value)?),
        b"IsTruncated" => page.is_truncated = parse_bool("IsTruncated", &value)?,
        b"Contents" => page.objects.push(std::mem::take(object).finish()?),
        _ => {}
    }
    Ok(())
}

#[derive(Default)]
struct PartialObject {
    key: Option<String>,
    last_modified: Option<OffsetDateTime>,
    etag: Option<String>,
    size: Option<u64>,
    storage_class: Option<String>,
}

impl PartialObject {
    fn finish(self) -> Result<ObjectEntry, Error> {
        let key = self
            .key
            .ok_or_else(|| Error::malformed("listing entry is missing Key", None))?;
        let last_modified = self.last_modified.ok_or_else(|| {
            Error::malformed(format!("listing entry {key:?} is missing LastModified"), None)
        })?;
        let size = self
            .size
            .ok_or_else(|| Error::malformed(format!("listing entry {key:?} is missing Size"), None))?;
        Ok(ObjectEntry::new(
            key,
            last_modified,
            self.etag,
            size,
            self.storage_class,
        ))
    }
}

pub(crate) fn encode_create_bucket_configuration(region: &str) -> Result<Bytes, Error> {
    if region.trim().is_empty() {
        return Err(Error::invalid_config(
            "create bucket location constraint must not be empty",
        ));
    }

    #[derive(serde::Serialize)]
    #[serde(rename = "CreateBucketConfiguration")]
    struct XmlCreateBucketConfiguration<'a> {
        #[serde(rename = "@xmlns")]
        xmlns: &'static str,
        #[serde(rename = "LocationConstraint")]
        location_constraint: &'a str,
    }

    let xml = quick_xml::se::to_string(&XmlCreateBucketConfiguration {
        xmlns: S3_XMLNS,
        location_constraint: region,
    })
    .map_err(|e| {
        Error::invalid_config(format!("failed to encode CreateBucketConfiguration XML: {e}"))
    })?;
    Ok(Bytes::from(xml))
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).map_err(|e| {
        Error::malformed(
            format!("invalid {field} timestamp {value:?}"),
            Some(Box::new(e)),
        )
    })
}

fn parse_number<T>(field: &str, value: &str) -> Result<T, Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse::<T>().map_err(|e| {
        Error::malformed(format!("invalid {field} value {value:?}"), Some(Box::new(e)))
    })
}

fn parse_bool(field: &str, value: &str) -> Result<bool, Error> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::malformed(
            format!("invalid {field} value {other:?}"),
            None,
        )),
    }
}

fn unexpected_root(expected: &str, found: &[u8]) -> Error {
    Error::malformed(
        format!(
            "expected <{expected}> root element, found <{}>",
            String::from_utf8_lossy(found)
        ),
        None,
    )
}

fn xml_error(document: &'static str) -> impl Fn(quick_xml::Error) -> Error {
    move |e| Error::malformed(format!("failed to parse {document} XML"), Some(Box::new(e)))
}
