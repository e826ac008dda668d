#![allow(dead_code)]

use std::{
    collections::VecDeque,
    convert::Infallible,
    env, io,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use futures_util::StreamExt as _;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use http_body::Frame;
use http_body_util::{BodyExt as _, Full, StreamBody, combinators::UnsyncBoxBody};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use s3wire::{AddressingStyle, Auth, Client, ClientBuilder, Error, ErrorKind, Region};
use tokio::net::TcpListener;

static BUCKET_COUNTER: AtomicUsize = AtomicUsize::new(0);

type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// What the scripted server does with the next request it receives.
pub(crate) enum Scripted {
    Respond {
        status: StatusCode,
        headers: Vec<(HeaderName, HeaderValue)>,
        body: Bytes,
    },
    /// Sends the head and `first` chunk, then stalls the body forever.
    Stall {
        content_length: u64,
        first: Bytes,
    },
    /// Drops the connection without answering.
    Reset,
}

impl Scripted {
    pub(crate) fn ok(body: impl Into<Bytes>) -> Self {
        Self::status(StatusCode::OK, body)
    }

    pub(crate) fn status(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::Respond {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub(crate) fn xml(status: StatusCode, body: &str) -> Self {
        Self::status(status, body.to_string()).header("content-type", "application/xml")
    }

    pub(crate) fn header(mut self, name: &'static str, value: &str) -> Self {
        if let Self::Respond { headers, .. } = &mut self {
            headers.push((
                HeaderName::from_static(name),
                HeaderValue::from_str(value).expect("valid header value"),
            ));
        }
        self
    }
}

/// A request as the server saw it.
#[derive(Clone, Debug)]
pub(crate) struct Recorded {
    pub(crate) method: Method,
    pub(crate) target: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

#[derive(Default)]
struct State {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Recorded>>,
    connections: AtomicUsize,
}

/// In-process HTTP/1.1 server answering from a script, one entry per request.
pub(crate) struct MockServer {
    addr: SocketAddr,
    state: Arc<State>,
}

impl MockServer {
    pub(crate) async fn start(script: Vec<Scripted>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let state = Arc::new(State {
            script: Mutex::new(script.into()),
            ..State::default()
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.connections.fetch_add(1, Ordering::SeqCst);
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = state.clone();
                        async move { state.handle(req).await }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, state }
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client builder pointed at this server with fast retries.
    pub(crate) fn client_builder(&self) -> ClientBuilder {
        Client::builder(self.endpoint())
            .expect("valid endpoint")
            .region("us-east-1")
            .auth(Auth::Static(
                s3wire::Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
                    .expect("credentials"),
            ))
            .base_retry_delay(Duration::from_millis(1))
            .max_retry_delay(Duration::from_millis(5))
    }

    pub(crate) fn client(&self) -> Client {
        self.client_builder().build().expect("client")
    }

    /// Connections accepted so far.
    pub(crate) fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().expect("requests lock").clone()
    }
}

impl State {
    async fn handle(
        &self,
        req: http::Request<Incoming>,
    ) -> Result<http::Response<ResponseBody>, io::Error> {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();
        self.requests.lock().expect("requests lock").push(Recorded {
            method: parts.method,
            target,
            headers: parts.headers,
            body,
        });

        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Scripted::Respond {
                status,
                headers,
                body,
            }) => {
                let mut response = http::Response::new(Full::new(body).boxed_unsync());
                *response.status_mut() = status;
                for (name, value) in headers {
                    response.headers_mut().insert(name, value);
                }
                response.headers_mut().insert(
                    "x-amz-request-id",
                    HeaderValue::from_static("MOCKREQUESTID"),
                );
                Ok(response)
            }
            Some(Scripted::Stall {
                content_length,
                first,
            }) => {
                let frames = futures_util::stream::once(async move {
                    Ok::<_, Infallible>(Frame::data(first))
                })
                .chain(futures_util::stream::pending());
                let mut response = http::Response::new(StreamBody::new(frames).boxed_unsync());
                response
                    .headers_mut()
                    .insert(http::header::CONTENT_LENGTH, HeaderValue::from(content_length));
                Ok(response)
            }
            Some(Scripted::Reset) => Err(io::Error::other("scripted reset")),
            None => {
                let mut response = http::Response::new(
                    Full::new(Bytes::from_static(b"unscripted request")).boxed_unsync(),
                );
                *response.status_mut() = StatusCode::NOT_IMPLEMENTED;
                Ok(response)
            }
        }
    }
}

pub(crate) fn list_bucket_result(
    bucket: &str,
    keys: &[&str],
    truncated: bool,
    next_marker: Option<&str>,
) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <Name>{bucket}</Name><Prefix></Prefix><Marker></Marker><MaxKeys>1000</MaxKeys>\
         <IsTruncated>{truncated}</IsTruncated>"
    );
    if let Some(marker) = next_marker {
        xml.push_str(&format!("<NextMarker>{marker}</NextMarker>"));
    }
    for key in keys {
        xml.push_str(&format!(
            "<Contents><Key>{key}</Key><LastModified>2009-10-12T17:50:30.000Z</LastModified>\
             <ETag>&quot;fba9dede5f27731c9771645a39863328&quot;</ETag><Size>5</Size>\
             <StorageClass>STANDARD</StorageClass></Contents>"
        ));
    }
    xml.push_str("</ListBucketResult>");
    xml
}

pub(crate) fn error_document(code: &str, message: &str, request_id: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Error><Code>{code}</Code><Message>{message}</Message>\
         <RequestId>{request_id}</RequestId><HostId>mock-host</HostId></Error>"
    )
}

pub(crate) struct TestConfig {
    pub(crate) endpoint: String,
    pub(crate) region: Region,
    pub(crate) auth: Auth,
}

/// Live-service settings from `S3_TEST_ENDPOINT` and the AWS credential variables.
pub(crate) fn load_config() -> Result<Option<TestConfig>, Error> {
    let Ok(endpoint) = env::var("S3_TEST_ENDPOINT") else {
        return Ok(None);
    };

    let region = env::var("S3_TEST_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let region = Region::new(region)?;

    let Ok(auth) = Auth::from_env() else {
        return Ok(None);
    };

    Ok(Some(TestConfig {
        endpoint,
        region,
        auth,
    }))
}

pub(crate) fn unique_bucket(prefix: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let n = BUCKET_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}{now}-{n}")
}

pub(crate) fn build_client(cfg: &TestConfig, style: AddressingStyle) -> Result<Client, Error> {
    Client::builder(&cfg.endpoint)?
        .region(cfg.region.as_str())
        .auth(cfg.auth.clone())
        .addressing_style(style)
        .build()
}

/// Creates a bucket, runs `f`, then empties and removes the bucket whatever `f` returned.
pub(crate) async fn with_bucket<F, Fut>(client: &Client, prefix: &str, f: F) -> Result<(), Error>
where
    F: FnOnce(String) -> Fut,
    Fut: std::future::Future<Output = Result<(), Error>>,
{
    let bucket = unique_bucket(prefix);
    client.buckets().create(&bucket).send().await?;

    let result = f(bucket.clone()).await;
    let cleanup = cleanup_bucket(client, &bucket).await;

    match result {
        Ok(()) => cleanup,
        Err(err) => Err(err),
    }
}

async fn cleanup_bucket(client: &Client, bucket: &str) -> Result<(), Error> {
    match client.buckets().delete(bucket).send().await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == Some(ErrorKind::NoSuchBucket) => Ok(()),
        Err(err) if err.kind() == Some(ErrorKind::BucketNotEmpty) => {
            delete_all_objects(client, bucket).await?;
            client.buckets().delete(bucket).send().await?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn delete_all_objects(client: &Client, bucket: &str) -> Result<(), Error> {
    let mut listing = client.objects().list(bucket).max_keys(1000).paginator();
    while let Some(page) = listing.next_page().await? {
        for object in page.objects() {
            client.objects().delete(bucket, object.key()).send().await?;
        }
    }
    Ok(())
}
