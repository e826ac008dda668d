mod buckets;
mod objects;
mod paginator;
mod parse;

pub(crate) use parse::parse;

pub use buckets::{BucketsService, CreateBucketRequest, DeleteBucketRequest, ListBucketsRequest};
pub use objects::{
    DeleteObjectRequest, GetObjectRequest, HeadObjectRequest, ListObjectsRequest, ObjectsService,
    PutObjectRequest,
};
pub use paginator::ListObjectsPaginator;
