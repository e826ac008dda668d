use std::{sync::Arc, time::Duration};

use http::{HeaderMap, HeaderValue, Method, header::USER_AGENT};
use tokio_util::sync::CancellationToken;
#[cfg(feature = "tracing")]
use tracing::Instrument as _;
use url::Url;

use crate::{
    api,
    auth::{AddressingStyle, Auth, Region, SignatureVersion},
    clock::{Clock, DynClock, SystemClock},
    error::{Error, Result},
    transport::{
        RetryPolicy,
        manager::ConnectionManager,
        pool::{PoolConfig, PoolStats},
        request::{Request, RequestBody},
        response::classify,
    },
    types::{OperationKind, Output},
    util::{self, signing::RequestSigner},
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Entry point for every operation.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

pub struct ClientBuilder {
    endpoint: Url,
    region: Option<String>,
    auth: Auth,
    addressing: AddressingStyle,
    signature_version: SignatureVersion,
    retry: RetryPolicy,
    pool: PoolConfig,
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
    user_agent: Option<String>,
    clock: DynClock,
}

struct Inner {
    endpoint: Url,
    region: Region,
    auth: Auth,
    addressing: AddressingStyle,
    signer: RequestSigner,
    manager: ConnectionManager,
    retry: RetryPolicy,
    user_agent: HeaderValue,
    clock: DynClock,
}

/// Everything one operation needs before it is signed.
pub(crate) struct Operation {
    pub(crate) kind: OperationKind,
    pub(crate) method: Method,
    pub(crate) bucket: Option<String>,
    pub(crate) key: Option<String>,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: RequestBody,
    /// Overrides the method's default retry eligibility.
    pub(crate) idempotent: Option<bool>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl Operation {
    pub(crate) fn new(kind: OperationKind, method: Method) -> Self {
        Self {
            kind,
            method,
            bucket: None,
            key: None,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            idempotent: None,
            cancel: None,
        }
    }

    pub(crate) fn bucket(mut self, bucket: &str) -> Self {
        self.bucket = Some(bucket.to_string());
        self
    }

    pub(crate) fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }
}

impl Client {
    pub fn builder(endpoint: impl AsRef<str>) -> Result<ClientBuilder> {
        ClientBuilder::new(endpoint.as_ref())
    }

    pub fn objects(&self) -> api::ObjectsService {
        api::ObjectsService::new(self.clone())
    }

    pub fn buckets(&self) -> api::BucketsService {
        api::BucketsService::new(self.clone())
    }

    /// Current connection pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.inner.manager.stats()
    }

    pub(crate) fn region(&self) -> &Region {
        &self.inner.region
    }

    /// Signs, sends, classifies and parses one operation.
    pub(crate) async fn execute(&self, operation: Operation) -> Result<Output> {
        #[cfg(feature = "tracing")]
        let span = tracing::info_span!(
            "s3.request",
            operation = operation.kind.as_str(),
            method = %operation.method,
            bucket = operation.bucket.as_deref().unwrap_or(""),
            key = operation.key.as_deref().unwrap_or(""),
            host = self.inner.endpoint.host_str().unwrap_or(""),
        );

        let fut = self.run(operation);
        #[cfg(feature = "tracing")]
        let fut = fut.instrument(span);
        fut.await
    }

    async fn run(&self, operation: Operation) -> Result<Output> {
        let Operation {
            kind,
            method,
            bucket,
            key,
            query,
            mut headers,
            body,
            idempotent,
            cancel,
        } = operation;

        let resolved = util::url::resolve_url(
            &self.inner.endpoint,
            bucket.as_deref(),
            key.as_deref(),
            &query,
            self.inner.addressing,
        )?;
        headers.insert(USER_AGENT, self.inner.user_agent.clone());

        let mut request = Request::new(
            method.clone(),
            resolved,
            headers,
            body,
            self.inner.clock.now(),
        )?;
        if let Some(idempotent) = idempotent {
            request = request.idempotent(idempotent);
        }

        let credentials = self.inner.auth.resolve()?;
        let signed = self.inner.signer.sign(request, credentials.as_ref())?;

        let raw = self
            .inner
            .manager
            .execute(signed, &self.inner.retry, cancel.as_ref())
            .await?;
        let raw = classify(raw, &method).await?;
        api::parse(raw, kind).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("region", &self.inner.region.as_str())
            .field("addressing", &self.inner.addressing)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|_| Error::invalid_config("endpoint must be a valid absolute URL"))?;

        match endpoint.scheme() {
            "http" => {}
            "https" if cfg!(feature = "native-tls") => {}
            "https" => {
                return Err(Error::invalid_config(
                    "https endpoints require the native-tls feature",
                ));
            }
            _ => {
                return Err(Error::invalid_config(
                    "endpoint scheme must be http or https",
                ));
            }
        }
        if endpoint.host_str().is_none() {
            return Err(Error::invalid_config("endpoint must include host"));
        }
        if endpoint.query().is_some() || endpoint.fragment().is_some() {
            return Err(Error::invalid_config(
                "endpoint must not include query or fragment",
            ));
        }
        if endpoint.path() != "/" && !endpoint.path().is_empty() {
            return Err(Error::invalid_config("endpoint must not include a path"));
        }

        Ok(Self {
            endpoint,
            region: None,
            auth: Auth::Anonymous,
            addressing: AddressingStyle::Auto,
            signature_version: SignatureVersion::default(),
            retry: RetryPolicy::default(),
            pool: PoolConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            user_agent: None,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn addressing_style(mut self, style: AddressingStyle) -> Self {
        self.addressing = style;
        self
    }

    pub fn signature_version(mut self, version: SignatureVersion) -> Self {
        self.signature_version = version;
        self
    }

    /// Total attempts per retryable request, including the first.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_retry_delay(mut self, delay: Duration) -> Self {
        self.retry.base_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.retry.max_delay = delay;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Limits how long one attempt may wait for the response head.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Upper bound on connections on loan at once. Further requests wait for a release.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.pool.max_connections = max.max(1);
        self
    }

    pub fn max_idle_per_host(mut self, max: usize) -> Self {
        self.pool.max_idle_per_host = max;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool.idle_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replaces the clock used for request timestamps.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn build(self) -> Result<Client> {
        let region = self
            .region
            .ok_or_else(|| Error::invalid_config("region is required"))
            .and_then(Region::new)?;

        let user_agent = match self.user_agent {
            Some(value) => HeaderValue::from_str(&value)
                .map_err(|_| Error::invalid_config("invalid user agent"))?,
            None => HeaderValue::from_static(concat!("s3wire/", env!("CARGO_PKG_VERSION"))),
        };

        let manager = ConnectionManager::new(self.pool, self.connect_timeout, self.request_timeout)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            endpoint = %self.endpoint,
            region = region.as_str(),
            max_connections = self.pool.max_connections,
            max_attempts = self.retry.max_attempts,
            "client built"
        );

        Ok(Client {
            inner: Arc::new(Inner {
                endpoint: self.endpoint,
                signer: RequestSigner::new(region.clone(), self.signature_version),
                region,
                auth: self.auth,
                addressing: self.addressing,
                manager,
                retry: self.retry,
                user_agent,
                clock: self.clock,
            }),
        })
    }
}
