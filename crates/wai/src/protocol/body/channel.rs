//! Bridge between push style stream producers and their consumer.
//!
//! A [`StreamProducer`](crate::protocol::StreamProducer) writes, the consumer pulls. The
//! two sides talk over a pair of channels:
//!
//! - a oneshot channel carrying the [`ResponseHead`], sent by [`Responder::start`]
//! - an mpsc channel of chunk requests, each carrying the chunk and a oneshot sender the
//!   consumer uses to answer with a [`Flow`]
//!
//! A [`BodyWriter::send`] completes only when the consumer has answered, so the producer
//! is always exactly one chunk ahead at most. When the consumer goes away every pending
//! and future send resolves to [`Flow::Stop`].

use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, SinkExt, StreamExt};
use http_body::{Body, Frame};
use tracing::trace;

use crate::protocol::stream::Flow;
use crate::protocol::{ResponseHead, StreamError};

pub(crate) type ChunkRequest = (Bytes, oneshot::Sender<Flow>);

type HeadMap = Box<dyn FnOnce(ResponseHead) -> ResponseHead + Send>;

/// Creates the producer handle and the consumer side receivers of one response.
pub(crate) fn body_channel() -> (Responder, oneshot::Receiver<ResponseHead>, mpsc::Receiver<ChunkRequest>) {
    let (head_sender, head_receiver) = oneshot::channel();
    // the single sender's own slot is enough, every send waits for its answer
    let (chunk_sender, chunk_receiver) = mpsc::channel(0);

    (Responder { head_sender, chunk_sender, head_map: None }, head_receiver, chunk_receiver)
}

/// Handed to a stream producer; sends the response head exactly once.
pub struct Responder {
    head_sender: oneshot::Sender<ResponseHead>,
    chunk_sender: mpsc::Sender<ChunkRequest>,
    head_map: Option<HeadMap>,
}

impl Responder {
    /// Delivers status and headers, and returns the writer for the body.
    ///
    /// Taking `self` makes a second head impossible, and the writer can only exist after
    /// the head was sent.
    pub fn start(self, head: ResponseHead) -> BodyWriter {
        let head = match self.head_map {
            Some(head_map) => head_map(head),
            None => head,
        };

        let stopped = self.head_sender.send(head).is_err();
        if stopped {
            trace!("response consumer is gone before the head was delivered");
        }

        BodyWriter { chunk_sender: self.chunk_sender, stopped }
    }

    /// Registers a rewrite applied to the head when [`start`](Responder::start) is called.
    ///
    /// Rewrites registered later run first, so an outer wrapper always sees the head
    /// produced by everything it wraps.
    pub(crate) fn map_head<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ResponseHead) -> ResponseHead + Send + 'static,
    {
        self.head_map = Some(match self.head_map.take() {
            Some(outer) => Box::new(move |head| outer(f(head))),
            None => Box::new(f),
        });
        self
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder").field("head_map", &self.head_map.is_some()).finish_non_exhaustive()
    }
}

/// Writes body chunks of a stream response.
#[derive(Debug)]
pub struct BodyWriter {
    chunk_sender: mpsc::Sender<ChunkRequest>,
    stopped: bool,
}

impl BodyWriter {
    /// Hands `chunk` to the consumer and waits for its answer.
    ///
    /// Once this returned [`Flow::Stop`] the consumer won't take any more chunks, the
    /// producer should release what it holds and return.
    pub async fn send<B: Into<Bytes>>(&mut self, chunk: B) -> Flow {
        if self.stopped {
            return Flow::Stop;
        }

        let (flow_sender, flow_receiver) = oneshot::channel();
        if self.chunk_sender.send((chunk.into(), flow_sender)).await.is_err() {
            return self.stop();
        }

        match flow_receiver.await {
            Ok(Flow::Continue) => Flow::Continue,
            Ok(Flow::Stop) | Err(_) => self.stop(),
        }
    }

    /// Returns true once the consumer has stopped the stream.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn stop(&mut self) -> Flow {
        self.stopped = true;
        self.chunk_sender.close_channel();
        Flow::Stop
    }
}

/// The pull side of a stream producer, usable as an [`http_body::Body`].
///
/// A chunk is acknowledged with [`Flow::Continue`] only when the next frame is polled,
/// and dropping the body answers [`Flow::Stop`].
#[derive(Debug)]
pub struct ChannelBody {
    chunk_receiver: mpsc::Receiver<ChunkRequest>,
    pending_ack: Option<oneshot::Sender<Flow>>,
    outcome: Option<oneshot::Receiver<Result<(), StreamError>>>,
}

impl ChannelBody {
    pub(crate) fn new(chunk_receiver: mpsc::Receiver<ChunkRequest>, outcome: oneshot::Receiver<Result<(), StreamError>>) -> Self {
        Self { chunk_receiver, pending_ack: None, outcome: Some(outcome) }
    }
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = StreamError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if let Some(ack) = this.pending_ack.take() {
            let _ = ack.send(Flow::Continue);
        }

        if let Some((chunk, ack)) = ready!(this.chunk_receiver.poll_next_unpin(cx)) {
            this.pending_ack = Some(ack);
            return Poll::Ready(Some(Ok(Frame::data(chunk))));
        }

        // all writers are gone, the producer has returned or is about to
        let Some(outcome) = this.outcome.as_mut() else {
            return Poll::Ready(None);
        };

        let result = ready!(outcome.poll_unpin(cx));
        this.outcome = None;
        match result {
            Ok(Ok(())) => Poll::Ready(None),
            Ok(Err(e)) => Poll::Ready(Some(Err(e))),
            // the producer task went away without reporting, e.g. it panicked
            Err(_) => {
                trace!("stream producer vanished without an outcome");
                Poll::Ready(Some(Err(StreamError::producer("stream producer aborted"))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.outcome.is_none()
    }
}
