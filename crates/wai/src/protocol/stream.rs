//! The chunk stream protocol.
//!
//! A response body is produced as a sequence of [`Bytes`] chunks and consumed by a
//! [`ChunkSink`]. The sink acts as a continuation: the producer hands it one chunk at a
//! time and the returned [`Flow`] decides whether production goes on. Termination is
//! always driven by the consumer:
//!
//! - [`Flow::Continue`]: ask for the next chunk
//! - [`Flow::Stop`]: early stop, the producer must release its resources and return
//! - `Err(StreamError)`: consumer failure, handled like a stop by the producer
//!
//! Pull based producers implement [`http_body::Body`] and are driven by [`pump`], which
//! polls exactly one frame per chunk boundary and never polls again after a stop. The
//! body is owned by `pump` and dropped before it returns, so resources such as an open
//! file are released before the consumer is finished.

use async_trait::async_trait;
use bytes::Bytes;
use http_body::Body;
use http_body_util::BodyExt;
use tracing::trace;

use crate::protocol::{ResponseHead, StreamError};

/// The consumer's answer after receiving a chunk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    /// The consumer wants the next chunk
    Continue,
    /// The consumer has seen enough, production must end
    Stop,
}

impl Flow {
    #[inline]
    pub fn is_continue(&self) -> bool {
        matches!(self, Flow::Continue)
    }

    #[inline]
    pub fn is_stop(&self) -> bool {
        matches!(self, Flow::Stop)
    }
}

/// How a stream ended when no error occurred.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The producer ran out of data
    Exhausted,
    /// The consumer signalled [`Flow::Stop`]
    Stopped,
}

/// The consumer side of a body stream.
///
/// Chunks arrive in production order, one at a time. After `send_chunk` returned
/// [`Flow::Stop`] or an error, no further chunk is delivered. Exactly one of
/// [`finish`](ChunkSink::finish) or [`fail`](ChunkSink::fail) is called at the end.
#[async_trait]
pub trait ChunkSink: Send + Sized {
    type Output: Send;

    /// Returns true if the sink wants no more chunks.
    ///
    /// Checked before every chunk is produced, including the first one, so a sink that
    /// is done from the start (e.g. answering a `HEAD` request) never causes a read.
    fn is_done(&self) -> bool {
        false
    }

    /// Takes the next chunk and tells whether the producer may go on.
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<Flow, StreamError>;

    /// Called when the stream ended normally, by exhaustion or by early stop.
    async fn finish(self, end: StreamEnd) -> Result<Self::Output, StreamError>;

    /// Called instead of `finish` when production failed. The default propagates the error.
    async fn fail(self, error: StreamError) -> Result<Self::Output, StreamError> {
        Err(error)
    }
}

/// The terminal consumer supplied by the hosting server.
///
/// It receives the response head exactly once, before any body chunk, and turns it into
/// the [`ChunkSink`] the body is streamed into. `start` takes `self` by value, so a head
/// can never be delivered twice.
///
/// When the response fails before a head exists (the file can't be opened, a stream
/// producer gave up before starting) [`abort`](ResponseConsumer::abort) is called
/// instead, so the consumer can still answer on its connection, e.g. with a 404.
///
/// Any `FnOnce(ResponseHead) -> impl ChunkSink` is a consumer.
#[async_trait]
pub trait ResponseConsumer: Send + Sized {
    type Sink: ChunkSink;

    /// Receives the head and returns the sink the body is streamed into.
    async fn start(self, head: ResponseHead) -> Result<Self::Sink, StreamError>;

    /// Called instead of `start` when no head could be produced. The default propagates
    /// the error.
    async fn abort(self, error: StreamError) -> Result<<Self::Sink as ChunkSink>::Output, StreamError> {
        Err(error)
    }
}

#[async_trait]
impl<F, S> ResponseConsumer for F
where
    F: FnOnce(ResponseHead) -> S + Send,
    S: ChunkSink,
{
    type Sink = S;

    async fn start(self, head: ResponseHead) -> Result<Self::Sink, StreamError> {
        Ok(self(head))
    }
}

/// Drives a pull based producer into `sink` until exhaustion, early stop or error.
///
/// The sink is asked whether it is done before each frame is polled, so a stop is seen
/// at the very next chunk boundary, the first one included. Non data frames (trailers)
/// are skipped. The body is dropped before returning on every path.
pub async fn pump<B, S>(mut body: B, sink: &mut S) -> Result<StreamEnd, StreamError>
where
    B: Body<Data = Bytes, Error = StreamError> + Unpin + Send,
    S: ChunkSink,
{
    loop {
        if sink.is_done() {
            trace!("consumer is done, body stream stopped before the next chunk");
            return Ok(StreamEnd::Stopped);
        }

        let chunk = match body.frame().await {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(chunk) => chunk,
                Err(_trailers) => continue,
            },
            Some(Err(e)) => return Err(e),
            None => return Ok(StreamEnd::Exhausted),
        };

        if sink.send_chunk(chunk).await?.is_stop() {
            trace!("consumer stopped the body stream");
            return Ok(StreamEnd::Stopped);
        }
    }
}

/// Hands the outcome of a pump to the sink: `finish` on success, `fail` otherwise.
pub(crate) async fn complete<S: ChunkSink>(sink: S, result: Result<StreamEnd, StreamError>) -> Result<S::Output, StreamError> {
    match result {
        Ok(end) => sink.finish(end).await,
        Err(e) => sink.fail(e).await,
    }
}
