use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};

use crate::protocol::StreamError;

/// A fully built buffer exposed as a body of exactly one chunk.
///
/// The chunk is offered even when the buffer is empty, so every buffer response yields
/// one chunk followed by the end of the stream.
#[derive(Debug, Clone)]
pub struct BufferBody {
    inner: Option<Bytes>,
}

impl BufferBody {
    pub fn new(bytes: Bytes) -> Self {
        Self { inner: Some(bytes) }
    }
}

impl From<Bytes> for BufferBody {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

impl From<BytesMut> for BufferBody {
    fn from(buf: BytesMut) -> Self {
        Self::new(buf.freeze())
    }
}

impl From<Vec<u8>> for BufferBody {
    fn from(vec: Vec<u8>) -> Self {
        Self::new(Bytes::from(vec))
    }
}

impl From<String> for BufferBody {
    fn from(value: String) -> Self {
        Self::new(Bytes::from(value))
    }
}

impl From<&'static str> for BufferBody {
    fn from(value: &'static str) -> Self {
        Self::new(Bytes::from_static(value.as_bytes()))
    }
}

impl Body for BufferBody {
    type Data = Bytes;
    type Error = StreamError;

    fn poll_frame(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().inner.take().map(|bytes| Ok(Frame::data(bytes))))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Some(bytes) => SizeHint::with_exact(bytes.len() as u64),
            None => SizeHint::with_exact(0),
        }
    }
}
