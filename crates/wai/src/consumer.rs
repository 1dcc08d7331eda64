//! Ready made response consumers.
//!
//! - [`Collect`]: keeps the head and every chunk in memory, mostly useful in tests and
//!   for small bodies
//! - [`WriteBody`]: writes the body to any [`AsyncWrite`], the way a server writes a
//!   response to its connection

use std::fmt;
use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::protocol::stream::{ChunkSink, Flow, ResponseConsumer, StreamEnd};
use crate::protocol::{ResponseHead, StreamError};

/// Collects a whole response, optionally stopping once `limit` bytes were received.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collect {
    limit: Option<usize>,
}

impl Collect {
    /// Collects everything the response produces.
    pub fn new() -> Self {
        Self { limit: None }
    }

    /// Stops the stream as soon as at least `limit` bytes were received.
    ///
    /// A limit of zero keeps only the head, no chunk is ever produced.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }
}

#[derive(Debug)]
pub struct CollectSink {
    head: ResponseHead,
    chunks: Vec<Bytes>,
    received: usize,
    limit: Option<usize>,
}

/// A fully consumed response.
#[derive(Debug)]
pub struct Collected {
    pub head: ResponseHead,
    pub chunks: Vec<Bytes>,
    pub end: StreamEnd,
}

impl Collected {
    /// Concatenates all chunks.
    pub fn into_body(self) -> Bytes {
        if self.chunks.len() == 1 {
            return self.chunks.into_iter().next().unwrap_or_default();
        }

        let mut body = BytesMut::with_capacity(self.chunks.iter().map(Bytes::len).sum());
        for chunk in &self.chunks {
            body.extend_from_slice(chunk);
        }
        body.freeze()
    }
}

#[async_trait]
impl ResponseConsumer for Collect {
    type Sink = CollectSink;

    async fn start(self, head: ResponseHead) -> Result<Self::Sink, StreamError> {
        Ok(CollectSink { head, chunks: Vec::new(), received: 0, limit: self.limit })
    }
}

#[async_trait]
impl ChunkSink for CollectSink {
    type Output = Collected;

    fn is_done(&self) -> bool {
        self.limit.is_some_and(|limit| self.received >= limit)
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> Result<Flow, StreamError> {
        self.received += chunk.len();
        self.chunks.push(chunk);

        match self.is_done() {
            true => Ok(Flow::Stop),
            false => Ok(Flow::Continue),
        }
    }

    async fn finish(self, end: StreamEnd) -> Result<Self::Output, StreamError> {
        Ok(Collected { head: self.head, chunks: self.chunks, end })
    }
}

/// Writes the response body to `W`.
///
/// The head is handed to `on_head` first, which lets the caller encode it in whatever
/// framing the connection uses. A writer that went away (broken pipe, connection reset)
/// stops the stream instead of failing it.
///
/// When the response fails before it has a head, `on_head` receives a bodiless `404 Not
/// Found` (missing file) or `500 Internal Server Error` instead, and the writer is handed
/// back with the failure in [`Written::aborted`].
pub struct WriteBody<W, F> {
    writer: W,
    on_head: F,
}

impl<W, F> WriteBody<W, F>
where
    W: AsyncWrite + Unpin + Send,
    F: FnOnce(&ResponseHead) + Send,
{
    pub fn new(writer: W, on_head: F) -> Self {
        Self { writer, on_head }
    }
}

impl<W: fmt::Debug, F> fmt::Debug for WriteBody<W, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBody").field("writer", &self.writer).finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct WriteSink<W> {
    head: ResponseHead,
    writer: W,
    bytes_written: u64,
    closed: bool,
}

#[derive(Debug)]
pub struct Written<W> {
    pub head: ResponseHead,
    pub bytes_written: u64,
    pub end: StreamEnd,
    pub writer: W,
    /// The failure that replaced the response, if it never got a head.
    pub aborted: Option<StreamError>,
}

#[async_trait]
impl<W, F> ResponseConsumer for WriteBody<W, F>
where
    W: AsyncWrite + Unpin + Send,
    F: FnOnce(&ResponseHead) + Send,
{
    type Sink = WriteSink<W>;

    async fn start(self, head: ResponseHead) -> Result<Self::Sink, StreamError> {
        (self.on_head)(&head);
        Ok(WriteSink { head, writer: self.writer, bytes_written: 0, closed: false })
    }

    async fn abort(self, error: StreamError) -> Result<Written<W>, StreamError> {
        let status = match &error {
            StreamError::Open { source, .. } if source.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        debug!(cause = %error, %status, "response failed before its head");

        let head = ResponseHead::new(status);
        (self.on_head)(&head);
        Ok(Written { head, bytes_written: 0, end: StreamEnd::Exhausted, writer: self.writer, aborted: Some(error) })
    }
}

fn is_closed_connection(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted)
}

#[async_trait]
impl<W> ChunkSink for WriteSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    type Output = Written<W>;

    fn is_done(&self) -> bool {
        self.closed
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> Result<Flow, StreamError> {
        match self.writer.write_all(&chunk).await {
            Ok(()) => {
                self.bytes_written += chunk.len() as u64;
                Ok(Flow::Continue)
            }
            Err(e) if is_closed_connection(&e) => {
                debug!(cause = %e, "peer went away, stopping the body stream");
                self.closed = true;
                Ok(Flow::Stop)
            }
            Err(e) => {
                warn!(cause = %e, "write body error");
                Err(StreamError::sink(e))
            }
        }
    }

    async fn finish(mut self, end: StreamEnd) -> Result<Self::Output, StreamError> {
        if !self.closed {
            self.writer.flush().await.map_err(StreamError::sink)?;
        }
        Ok(Written { head: self.head, bytes_written: self.bytes_written, end, writer: self.writer, aborted: None })
    }
}
