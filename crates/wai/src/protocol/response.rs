//! Response model.
//!
//! A [`Response`] says *how* a body is obtained, it never holds live state. The live
//! state (an open file, a running generator) only exists once the response is handed to
//! the [`Realizer`](crate::realize::Realizer).

use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderName, HeaderValue, StatusCode};

use crate::protocol::body::Responder;
use crate::protocol::{HeaderList, StreamError};

/// Status and headers of a response.
///
/// Headers are an ordered list, duplicated names are kept in the order they were added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    status: StatusCode,
    headers: HeaderList,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: Vec::new() }
    }

    pub fn with_headers(status: StatusCode, headers: HeaderList) -> Self {
        Self { status, headers }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn status_mut(&mut self) -> &mut StatusCode {
        &mut self.status
    }

    #[inline]
    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderList {
        &mut self.headers
    }

    /// Returns the first value of the header `name`.
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Appends a header, keeping existing values with the same name.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.push((name, value));
    }

    /// Replaces every value of `name` by a single `value` at the end of the list.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.remove_header(&name);
        self.headers.push((name, value));
    }

    pub fn remove_header(&mut self, name: &HeaderName) {
        self.headers.retain(|(key, _)| key != name);
    }

    pub fn into_parts(self) -> (StatusCode, HeaderList) {
        (self.status, self.headers)
    }

    /// Attaches a body, converting the head into an `http::Response`.
    pub fn into_http<B>(self, body: B) -> http::Response<B> {
        let mut response = http::Response::new(body);
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.reserve(self.headers.len());
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }
}

/// A contiguous byte window of a file: `count` bytes starting at `offset`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FilePart {
    pub offset: u64,
    pub count: u64,
}

impl FilePart {
    pub fn new(offset: u64, count: u64) -> Self {
        Self { offset, count }
    }
}

type ProduceFn = Box<dyn FnOnce(Responder) -> BoxFuture<'static, Result<(), StreamError>> + Send>;

/// A custom body generator.
///
/// The producer receives a [`Responder`], decides the head by calling
/// [`Responder::start`] and then writes the body chunk by chunk through the returned
/// [`BodyWriter`](crate::protocol::body::BodyWriter). Each write waits until the consumer
/// has taken the chunk and reports whether it wants more.
pub struct StreamProducer {
    produce: ProduceFn,
}

impl StreamProducer {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Responder) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        Self { produce: Box::new(move |responder| Box::pin(f(responder))) }
    }

    pub(crate) fn produce(self, responder: Responder) -> BoxFuture<'static, Result<(), StreamError>> {
        (self.produce)(responder)
    }

    /// Rewrites the head when the producer starts.
    fn map_head<F>(self, f: F) -> Self
    where
        F: FnOnce(ResponseHead) -> ResponseHead + Send + 'static,
    {
        let produce = self.produce;
        Self { produce: Box::new(move |responder| produce(responder.map_head(f))) }
    }
}

impl fmt::Debug for StreamProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamProducer").finish_non_exhaustive()
    }
}

/// A response, described by the strategy used to produce its body.
#[derive(Debug)]
pub enum Response {
    /// The whole file, or the [`FilePart`] of it, read in blocks.
    File { status: StatusCode, headers: HeaderList, path: PathBuf, part: Option<FilePart> },

    /// An already built buffer, delivered as a single chunk.
    Buffer { status: StatusCode, headers: HeaderList, body: Bytes },

    /// A custom producer that decides status and headers itself.
    Stream(StreamProducer),
}

impl Response {
    /// Sends the whole file at `path`, read in blocks when the response is realized.
    pub fn file<P: Into<PathBuf>>(status: StatusCode, headers: HeaderList, path: P) -> Self {
        Self::File { status, headers, path: path.into(), part: None }
    }

    /// Sends `part.count` bytes of the file at `path`, starting at `part.offset`.
    ///
    /// Headers such as `Content-Range` are left to the application.
    pub fn file_part<P: Into<PathBuf>>(status: StatusCode, headers: HeaderList, path: P, part: FilePart) -> Self {
        Self::File { status, headers, path: path.into(), part: Some(part) }
    }

    /// Sends `body` as a single chunk.
    pub fn buffer<B: Into<Bytes>>(status: StatusCode, headers: HeaderList, body: B) -> Self {
        Self::Buffer { status, headers, body: body.into() }
    }

    /// Runs `f` when the response is realized. It sends the head through the
    /// [`Responder`] and then writes the body chunk by chunk.
    pub fn stream<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Responder) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        Self::Stream(StreamProducer::new(f))
    }

    /// The status, when it is fixed before streaming starts.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Response::File { status, .. } | Response::Buffer { status, .. } => Some(*status),
            Response::Stream(_) => None,
        }
    }

    /// The headers, when they are fixed before streaming starts.
    pub fn headers(&self) -> Option<&[(HeaderName, HeaderValue)]> {
        match self {
            Response::File { headers, .. } | Response::Buffer { headers, .. } => Some(headers),
            Response::Stream(_) => None,
        }
    }

    #[inline]
    pub fn is_stream(&self) -> bool {
        matches!(self, Response::Stream(_))
    }

    /// Rewrites status and headers.
    ///
    /// File and buffer responses are rewritten right away. For stream responses `f` runs
    /// when the producer delivers its head, before the consumer sees it.
    pub fn map_head<F>(self, f: F) -> Self
    where
        F: FnOnce(ResponseHead) -> ResponseHead + Send + 'static,
    {
        match self {
            Response::File { status, headers, path, part } => {
                let (status, headers) = f(ResponseHead::with_headers(status, headers)).into_parts();
                Response::File { status, headers, path, part }
            }
            Response::Buffer { status, headers, body } => {
                let (status, headers) = f(ResponseHead::with_headers(status, headers)).into_parts();
                Response::Buffer { status, headers, body }
            }
            Response::Stream(producer) => Response::Stream(producer.map_head(f)),
        }
    }

    /// Replaces the header `name` on any kind of response.
    pub fn with_header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.map_head(move |mut head| {
            head.set_header(name, value);
            head
        })
    }
}
