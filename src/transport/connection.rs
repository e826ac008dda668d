use std::time::Duration;

use hyper::{body::Incoming, client::conn::http1};
use hyper_util::client::legacy::connect::HttpConnector;
use tokio::task::JoinHandle;
use tower::ServiceExt as _;

use crate::{
    error::Error,
    transport::{pool::Poolable, request::HttpBody},
};

#[cfg(feature = "native-tls")]
type Transport = hyper_tls::HttpsConnector<HttpConnector>;
#[cfg(not(feature = "native-tls"))]
type Transport = HttpConnector;

/// Opens HTTP/1.1 connections over TCP, or TLS when enabled.
#[derive(Clone)]
pub(crate) struct Connector {
    inner: Transport,
    connect_timeout: Duration,
}

impl Connector {
    pub(crate) fn new(connect_timeout: Duration) -> Result<Self, Error> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.set_connect_timeout(Some(connect_timeout));

        #[cfg(feature = "native-tls")]
        let inner = {
            http.enforce_http(false);
            let tls = native_tls::TlsConnector::new().map_err(|e| {
                Error::invalid_config(format!("failed to initialize TLS: {e}"))
            })?;
            hyper_tls::HttpsConnector::from((http, tls.into()))
        };
        #[cfg(not(feature = "native-tls"))]
        let inner = http;

        Ok(Self {
            inner,
            connect_timeout,
        })
    }

    /// Dials `origin` (`scheme://host:port`) and completes the HTTP/1.1 handshake.
    pub(crate) async fn connect(&self, origin: &str) -> Result<HttpConnection, Error> {
        let uri = origin
            .parse::<http::Uri>()
            .map_err(|e| Error::invalid_config(format!("invalid connection origin: {e}")))?;

        let io = tokio::time::timeout(self.connect_timeout, self.inner.clone().oneshot(uri))
            .await
            .map_err(|_| Error::transport("connect timed out", None))?
            .map_err(|e| Error::transport("connect failed", Some(e.into())))?;

        let (sender, conn) = http1::handshake(io)
            .await
            .map_err(|e| Error::transport("HTTP handshake failed", Some(Box::new(e))))?;

        #[cfg(feature = "tracing")]
        let origin = origin.to_string();
        let driver = tokio::spawn(async move {
            if let Err(_err) = conn.await {
                #[cfg(feature = "tracing")]
                tracing::warn!(origin = %origin, error = %_err, "connection closed with error");
            }
        });

        #[cfg(feature = "metrics")]
        metrics::counter!("s3_pool_connections_created_total").increment(1);

        Ok(HttpConnection { sender, driver })
    }
}

/// One HTTP/1.1 connection. Dropping it tears the socket down.
pub(crate) struct HttpConnection {
    sender: http1::SendRequest<HttpBody>,
    driver: JoinHandle<()>,
}

impl HttpConnection {
    /// Waits until the connection can take another request.
    pub(crate) async fn ready(&mut self) -> Result<(), hyper::Error> {
        self.sender.ready().await
    }

    pub(crate) async fn send(
        &mut self,
        request: http::Request<HttpBody>,
    ) -> Result<http::Response<Incoming>, hyper::Error> {
        self.sender.send_request(request).await
    }
}

impl Poolable for HttpConnection {
    fn is_open(&self) -> bool {
        !self.sender.is_closed() && !self.driver.is_finished()
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
