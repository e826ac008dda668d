use http::{HeaderValue, Method};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{Client, Operation},
    error::Result,
    transport::request::RequestBody,
    types::{CreateBucketOutput, DeleteBucketOutput, ListBucketsOutput, OperationKind},
};

#[derive(Clone)]
pub struct BucketsService {
    client: Client,
}

impl BucketsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn list(&self) -> ListBucketsRequest {
        ListBucketsRequest {
            client: self.client.clone(),
            cancel: None,
        }
    }

    /// Creates `bucket` in the client's region unless another location is set.
    pub fn create(&self, bucket: impl Into<String>) -> CreateBucketRequest {
        CreateBucketRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            location_constraint: None,
            cancel: None,
        }
    }

    pub fn delete(&self, bucket: impl Into<String>) -> DeleteBucketRequest {
        DeleteBucketRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            cancel: None,
        }
    }
}

pub struct ListBucketsRequest {
    client: Client,
    cancel: Option<CancellationToken>,
}

impl ListBucketsRequest {
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn send(self) -> Result<ListBucketsOutput> {
        let mut operation = Operation::new(OperationKind::ListBuckets, Method::GET);
        operation.cancel = self.cancel;

        self.client.execute(operation).await?.try_into()
    }
}

pub struct CreateBucketRequest {
    client: Client,
    bucket: String,
    location_constraint: Option<String>,
    cancel: Option<CancellationToken>,
}

impl CreateBucketRequest {
    /// Region to create the bucket in, when it differs from the client's.
    pub fn location_constraint(mut self, region: impl Into<String>) -> Self {
        self.location_constraint = Some(region.into());
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn send(self) -> Result<CreateBucketOutput> {
        let mut operation =
            Operation::new(OperationKind::CreateBucket, Method::PUT).bucket(&self.bucket);

        // us-east-1 is the implied location and must not be sent as a constraint.
        let location = self.location_constraint.or_else(|| {
            let region = self.client.region();
            (!region.is_us_east_1()).then(|| region.as_str().to_string())
        });
        if let Some(location) = location.filter(|l| l != "us-east-1") {
            let body = crate::util::xml::encode_create_bucket_configuration(&location)?;
            operation.headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/xml"),
            );
            operation.headers.insert(
                crate::util::md5::CONTENT_MD5,
                crate::util::md5::digest_header(&body)?,
            );
            operation.body = RequestBody::Bytes(body);
        }
        operation.cancel = self.cancel;

        self.client.execute(operation).await?.try_into()
    }
}

pub struct DeleteBucketRequest {
    client: Client,
    bucket: String,
    cancel: Option<CancellationToken>,
}

impl DeleteBucketRequest {
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn send(self) -> Result<DeleteBucketOutput> {
        let mut operation =
            Operation::new(OperationKind::DeleteBucket, Method::DELETE).bucket(&self.bucket);
        operation.cancel = self.cancel;

        self.client.execute(operation).await?.try_into()
    }
}
