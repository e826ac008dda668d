use bytes::{Buf as _, Bytes, BytesMut};
use futures_core::Stream;
use http_body::Body as _;
use http_body_util::BodyExt as _;
use hyper::body::Incoming;
use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    transport::{connection::HttpConnection, pool::Pooled},
};

/// Largest remainder read off the wire just to keep a connection reusable.
pub(crate) const MAX_DRAIN: usize = 64 * 1024;

/// Incrementally readable response body.
///
/// The body borrows the connection it arrived on. The connection goes back to the pool the
/// moment end-of-stream is observed, exactly once; reading further keeps returning
/// end-of-stream. Dropping or aborting the body before that point closes the connection
/// instead, so a partially read socket is never reused.
///
/// If a cancellation token is bound to the body, firing it closes the connection and makes
/// the current and every later read fail with [`Error::Cancelled`].
pub struct ObjectBody {
    state: State,
    pending: Bytes,
    cancel: Option<CancellationToken>,
    content_length: Option<u64>,
}

enum State {
    Live {
        incoming: Incoming,
        conn: Pooled<HttpConnection>,
    },
    Finished,
    Cancelled,
    Broken,
}

impl ObjectBody {
    pub(crate) fn new(
        incoming: Incoming,
        conn: Pooled<HttpConnection>,
        cancel: Option<CancellationToken>,
        content_length: Option<u64>,
    ) -> Self {
        Self {
            state: State::Live { incoming, conn },
            pending: Bytes::new(),
            cancel,
            content_length,
        }
    }

    /// Length announced by the response headers, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Returns true once end-of-stream has been observed.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Finished) && self.pending.is_empty()
    }

    /// Reads the next chunk, or `None` at end-of-stream.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            // Buffered bytes are dropped with the connection.
            self.pending.clear();
            self.state = State::Cancelled;
            return Err(Error::Cancelled);
        }
        if !self.pending.is_empty() {
            return Ok(Some(std::mem::take(&mut self.pending)));
        }

        loop {
            let next = match &mut self.state {
                State::Live { incoming, .. } => match self.cancel.as_ref() {
                    Some(token) => tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        frame = incoming.frame() => Some(frame),
                    },
                    None => Some(incoming.frame().await),
                },
                State::Finished => return Ok(None),
                State::Cancelled => return Err(Error::Cancelled),
                State::Broken => {
                    return Err(Error::transport("response body failed earlier", None));
                }
            };

            match next {
                None => {
                    self.state = State::Cancelled;
                    return Err(Error::Cancelled);
                }
                Some(None) => {
                    self.finish();
                    return Ok(None);
                }
                Some(Some(Err(err))) => {
                    self.state = State::Broken;
                    return Err(Error::transport(
                        "failed to read response body",
                        Some(Box::new(err)),
                    ));
                }
                Some(Some(Ok(frame))) => {
                    let Ok(data) = frame.into_data() else {
                        continue;
                    };
                    if self.at_end_of_stream() {
                        self.finish();
                    }
                    if !data.is_empty() {
                        return Ok(Some(data));
                    }
                }
            }
        }
    }

    /// Copies up to `buf.len()` bytes into `buf`. Returns `0` at end-of-stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.chunk().await? {
            Some(chunk) => self.pending = chunk,
            None => return Ok(0),
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    /// Buffers the remainder of the body.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        if let Some(len) = self.content_length {
            out.reserve(usize::try_from(len).unwrap_or(0).min(8 * 1024 * 1024));
        }
        while let Some(chunk) = self.chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }

    /// Streams the remainder of the body into `writer`, returning the number of bytes copied.
    pub async fn write_to<W>(&mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.chunk().await? {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| Error::transport("failed to write object body", Some(Box::new(e))))?;
            written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| Error::transport("failed to flush object body", Some(Box::new(e))))?;
        Ok(written)
    }

    /// Reads and discards the remainder so the connection can be reused.
    ///
    /// A remainder longer than 64 KiB is not read; the connection is closed instead.
    pub async fn discard(&mut self) -> Result<()> {
        self.prefix(MAX_DRAIN).await.map(drop)
    }

    /// Buffers at most `limit` bytes. A body longer than that is closed rather than drained.
    pub(crate) async fn prefix(&mut self, limit: usize) -> Result<Bytes> {
        let mut out = BytesMut::new();
        while out.len() < limit {
            match self.chunk().await? {
                Some(chunk) => out.extend_from_slice(&chunk),
                None => return Ok(out.freeze()),
            }
        }
        if matches!(self.state, State::Live { .. }) {
            self.state = State::Broken;
        }
        out.truncate(limit);
        Ok(out.freeze())
    }

    /// Stops reading and closes the underlying connection.
    pub fn abort(mut self) {
        if matches!(self.state, State::Live { .. }) {
            self.state = State::Broken;
        }
    }

    /// Adapts the body into a stream of chunks.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + Send {
        futures_util::stream::try_unfold(self, |mut body| async move {
            Ok(body.chunk().await?.map(|chunk| (chunk, body)))
        })
    }

    fn at_end_of_stream(&self) -> bool {
        match &self.state {
            State::Live { incoming, .. } => incoming.is_end_stream(),
            _ => true,
        }
    }

    fn finish(&mut self) {
        if let State::Live { incoming, conn, .. } =
            std::mem::replace(&mut self.state, State::Finished)
        {
            drop(incoming);
            conn.release();
        }
    }
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Live { .. } => "live",
            State::Finished => "finished",
            State::Cancelled => "cancelled",
            State::Broken => "closed",
        };
        f.debug_struct("ObjectBody")
            .field("state", &state)
            .field("content_length", &self.content_length)
            .finish()
    }
}
