use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

use crate::protocol::StreamError;
use crate::protocol::body::{BufferBody, ChannelBody, FileBody};

/// Any response body, produced by [`Realizer::into_http`](crate::realize::Realizer::into_http).
#[derive(Debug)]
pub struct ResponseBody {
    inner: Kind,
}

#[derive(Debug)]
enum Kind {
    Buffer(BufferBody),
    File(FileBody),
    Channel(ChannelBody),
}

impl ResponseBody {
    /// A body with one empty chunk.
    pub fn empty() -> Self {
        Self::buffer(BufferBody::new(Bytes::new()))
    }

    /// Wraps a [`BufferBody`].
    pub fn buffer(body: BufferBody) -> Self {
        Self { inner: Kind::Buffer(body) }
    }

    /// Wraps a [`FileBody`], releasing the file when the body is dropped.
    pub fn file(body: FileBody) -> Self {
        Self { inner: Kind::File(body) }
    }

    /// Wraps the pull side of a stream producer.
    pub fn channel(body: ChannelBody) -> Self {
        Self { inner: Kind::Channel(body) }
    }
}

impl From<BufferBody> for ResponseBody {
    fn from(body: BufferBody) -> Self {
        Self::buffer(body)
    }
}

impl From<FileBody> for ResponseBody {
    fn from(body: FileBody) -> Self {
        Self::file(body)
    }
}

impl From<ChannelBody> for ResponseBody {
    fn from(body: ChannelBody) -> Self {
        Self::channel(body)
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = StreamError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().inner {
            Kind::Buffer(body) => Pin::new(body).poll_frame(cx),
            Kind::File(body) => Pin::new(body).poll_frame(cx),
            Kind::Channel(body) => Pin::new(body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Buffer(body) => body.is_end_stream(),
            Kind::File(body) => body.is_end_stream(),
            Kind::Channel(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Buffer(body) => body.size_hint(),
            Kind::File(body) => body.size_hint(),
            Kind::Channel(body) => body.size_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn check_send<T: Send>() {}

    #[test]
    fn is_send() {
        check_send::<ResponseBody>();
    }

    #[tokio::test]
    async fn empty_body_yields_one_empty_chunk() {
        let mut body = ResponseBody::empty();
        assert_eq!(body.size_hint().exact(), Some(0));

        let bytes = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert!(bytes.is_empty());
        assert!(body.frame().await.is_none());
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn delegates_to_buffer() {
        let body = ResponseBody::from(BufferBody::from("Hello world"));
        assert_eq!(body.size_hint().exact(), Some(11));
        assert_eq!(body.collect().await.unwrap().to_bytes(), Bytes::from("Hello world"));
    }
}
