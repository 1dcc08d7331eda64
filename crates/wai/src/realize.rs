//! Turning a [`Response`] into status, headers and a chunk stream.
//!
//! [`Realizer::realize`] drives a response into a host supplied [`ResponseConsumer`] on the
//! current task. [`Realizer::into_http`] instead returns an `http::Response` whose body a
//! host built on the `http` ecosystem can poll itself.
//!
//! In both cases the head is delivered exactly once and before the first chunk. For file
//! responses the file is opened before anything is delivered, so an open failure reaches
//! the consumer's `abort` with no head and no chunk.

use futures::StreamExt;
use futures::channel::oneshot;
use tracing::{debug, error, trace};

use crate::config::StreamConfig;
use crate::protocol::body::{BufferBody, ChannelBody, FileBody, ResponseBody, body_channel};
use crate::protocol::stream::{ChunkSink, Flow, ResponseConsumer, StreamEnd, complete, pump};
use crate::protocol::{Response, ResponseHead, StreamError, StreamProducer};

/// Realizes responses with a given [`StreamConfig`].
#[derive(Debug, Clone, Default)]
pub struct Realizer {
    config: StreamConfig,
}

enum Drive<C, S> {
    NoHead(C),
    StartFailed(StreamError),
    Started(S, Result<StreamEnd, StreamError>),
}

impl Realizer {
    /// Creates a realizer reading files with `config`.
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Streams `response` into `consumer`.
    ///
    /// Returns what the consumer's sink produced on `finish` or `fail`. When the response
    /// fails before a head exists (an open failure, a stream producer that never sent its
    /// head) the consumer's `abort` decides the result instead.
    pub async fn realize<C>(&self, response: Response, consumer: C) -> Result<<C::Sink as ChunkSink>::Output, StreamError>
    where
        C: ResponseConsumer,
    {
        match response {
            Response::Buffer { status, headers, body } => {
                let mut sink = consumer.start(ResponseHead::with_headers(status, headers)).await?;
                let result = pump(BufferBody::new(body), &mut sink).await;
                complete(sink, result).await
            }

            Response::File { status, headers, path, part } => {
                let body = match FileBody::open(&path, part, &self.config).await {
                    Ok(body) => body,
                    Err(e) => {
                        debug!(cause = %e, "file response failed before head delivery");
                        return consumer.abort(e).await;
                    }
                };

                let mut sink = consumer.start(ResponseHead::with_headers(status, headers)).await?;
                let result = pump(body, &mut sink).await;
                complete(sink, result).await
            }

            Response::Stream(producer) => self.realize_stream(producer, consumer).await,
        }
    }

    async fn realize_stream<C>(&self, producer: StreamProducer, consumer: C) -> Result<<C::Sink as ChunkSink>::Output, StreamError>
    where
        C: ResponseConsumer,
    {
        let (responder, head_receiver, mut chunk_receiver) = body_channel();

        let drive = async move {
            let Ok(head) = head_receiver.await else {
                return Drive::NoHead(consumer);
            };

            let mut sink = match consumer.start(head).await {
                Ok(sink) => sink,
                Err(e) => return Drive::StartFailed(e),
            };

            let mut end = Ok(StreamEnd::Exhausted);
            loop {
                if sink.is_done() {
                    trace!("consumer is done, stream producer stopped before the next chunk");
                    end = Ok(StreamEnd::Stopped);
                    break;
                }

                let Some((chunk, ack)) = chunk_receiver.next().await else {
                    break;
                };

                match sink.send_chunk(chunk).await {
                    Ok(Flow::Continue) => {
                        let _ = ack.send(Flow::Continue);
                    }
                    Ok(Flow::Stop) => {
                        trace!("consumer stopped the stream producer");
                        let _ = ack.send(Flow::Stop);
                        end = Ok(StreamEnd::Stopped);
                        break;
                    }
                    Err(e) => {
                        let _ = ack.send(Flow::Stop);
                        end = Err(e);
                        break;
                    }
                }
            }

            // writes after a stop resolve to Flow::Stop right away
            drop(chunk_receiver);
            Drive::Started(sink, end)
        };

        let (produced, driven) = futures::join!(producer.produce(responder), drive);

        match driven {
            Drive::NoHead(consumer) => {
                let error = produced.err().unwrap_or(StreamError::MissingHead);
                debug!(cause = %error, "stream response failed before head delivery");
                consumer.abort(error).await
            }
            // `start` took the consumer, there is nothing left to abort
            Drive::StartFailed(e) => Err(e),
            Drive::Started(sink, end) => {
                let result = match (end, produced) {
                    (Err(e), _) | (Ok(_), Err(e)) => Err(e),
                    (Ok(end), Ok(())) => Ok(end),
                };
                complete(sink, result).await
            }
        }
    }

    /// Converts `response` into an `http::Response` with a pollable body.
    ///
    /// Stream producers are spawned on the tokio runtime and this waits until they have
    /// sent their head. Dropping the returned body stops the producer at its next write.
    pub async fn into_http(&self, response: Response) -> Result<http::Response<ResponseBody>, StreamError> {
        match response {
            Response::Buffer { status, headers, body } => {
                Ok(ResponseHead::with_headers(status, headers).into_http(BufferBody::new(body).into()))
            }

            Response::File { status, headers, path, part } => {
                let body = FileBody::open(&path, part, &self.config).await?;
                Ok(ResponseHead::with_headers(status, headers).into_http(body.into()))
            }

            Response::Stream(producer) => {
                let (responder, head_receiver, chunk_receiver) = body_channel();
                let (outcome_sender, outcome_receiver) = oneshot::channel();

                tokio::spawn(async move {
                    let result = producer.produce(responder).await;
                    if let Err(e) = &result {
                        error!(cause = %e, "stream producer failed");
                    }
                    let _ = outcome_sender.send(result);
                });

                match head_receiver.await {
                    Ok(head) => Ok(head.into_http(ChannelBody::new(chunk_receiver, outcome_receiver).into())),
                    // the producer returned without starting
                    Err(_) => match outcome_receiver.await {
                        Ok(Err(e)) => Err(e),
                        _ => Err(StreamError::MissingHead),
                    },
                }
            }
        }
    }
}

/// Streams `response` into `consumer` with the default [`StreamConfig`].
pub async fn realize<C>(response: Response, consumer: C) -> Result<<C::Sink as ChunkSink>::Output, StreamError>
where
    C: ResponseConsumer,
{
    Realizer::default().realize(response, consumer).await
}
