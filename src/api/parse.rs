use http::header::LOCATION;

use crate::{
    error::Result,
    transport::response::RawResponse,
    types::{
        CreateBucketOutput, DeleteBucketOutput, DeleteObjectOutput, GetObjectOutput,
        HeadObjectOutput, ListBucketsOutput, ObjectAttributes, OperationKind, Output,
        PutObjectOutput, ResponseMetadata,
    },
    util::{headers::header_string, xml},
};

/// Turns a successful response into the typed output for `kind`.
///
/// Only `GetObject` keeps the body open; every other operation consumes it here so the
/// connection is back in the pool before the output reaches the caller.
pub(crate) async fn parse(raw: RawResponse, kind: OperationKind) -> Result<Output> {
    let RawResponse {
        headers, mut body, ..
    } = raw;
    let metadata = ResponseMetadata::from_headers(&headers);

    let output = match kind {
        OperationKind::CreateBucket => {
            body.discard().await?;
            Output::CreateBucket(CreateBucketOutput::new(
                metadata,
                header_string(&headers, LOCATION),
            ))
        }
        OperationKind::ListBuckets => {
            let payload = body.bytes().await?;
            let list = xml::parse_list_buckets(&payload)?;
            Output::ListBuckets(ListBucketsOutput::new(metadata, list.owner, list.buckets))
        }
        OperationKind::DeleteBucket => {
            body.discard().await?;
            Output::DeleteBucket(DeleteBucketOutput::new(metadata))
        }
        OperationKind::ListObjects => {
            let payload = body.bytes().await?;
            let page = xml::parse_list_objects(&payload)?;
            Output::ListObjects(page.with_metadata(metadata))
        }
        OperationKind::PutObject => {
            body.discard().await?;
            Output::PutObject(PutObjectOutput::new(
                metadata,
                header_string(&headers, "x-amz-version-id"),
            ))
        }
        OperationKind::GetObject => {
            let attributes = ObjectAttributes::from_headers(&headers);
            Output::GetObject(GetObjectOutput::new(metadata, attributes, body))
        }
        OperationKind::HeadObject => {
            body.discard().await?;
            let attributes = ObjectAttributes::from_headers(&headers);
            Output::HeadObject(HeadObjectOutput::new(metadata, attributes))
        }
        OperationKind::DeleteObject => {
            body.discard().await?;
            Output::DeleteObject(DeleteObjectOutput::new(metadata))
        }
    };

    Ok(output)
}
