//! A lean S3 protocol engine.
//!
//! Every operation goes through the same pipeline: the request is signed (SigV4 by
//! default, legacy SigV2 on request), sent over a pooled HTTP/1.1 connection with
//! retries for transient failures, classified against the service's fault format and
//! parsed into a read-only output. Object bodies stream straight off the connection and
//! listings are walked lazily, one page per request.
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn demo() -> Result<(), s3wire::Error> {
//! use s3wire::{Auth, Client};
//!
//! let client = Client::builder("https://s3.example.com")?
//!     .region("us-east-1")
//!     .auth(Auth::from_env()?)
//!     .build()?;
//!
//! let obj = client
//!     .objects()
//!     .get("my-bucket", "path/to/object.txt")
//!     .send()
//!     .await?;
//! let bytes = obj.bytes().await?;
//! println!("{} bytes", bytes.len());
//!
//! let mut listing = client.objects().list("my-bucket").prefix("logs/").paginator();
//! while let Some(entry) = listing.next_entry().await? {
//!     println!("{}", entry.key());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Bodies and connections
//!
//! A [`types::GetObjectOutput`] keeps its connection until the body has been read to the
//! end, at which point the connection goes back to the pool. Dropping or
//! [aborting](ObjectBody::abort) a body early closes the connection instead.

/// Service entry points and request builders.
pub mod api;
/// Read-only operation outputs.
pub mod types;

mod auth;
mod client;
mod clock;
mod error;
mod transport;
mod util;

pub use auth::{
    AddressingStyle, Auth, Credentials, CredentialsProvider, DynCredentialsProvider, Region,
    SignatureVersion,
};
pub use client::{Client, ClientBuilder};
pub use clock::{Clock, DynClock, FixedClock, SystemClock};
pub use error::{Error, ErrorKind, Result};
pub use tokio_util::sync::CancellationToken;
pub use transport::body::ObjectBody;
pub use types::PoolStats;
