//! Core abstractions shared by servers and applications.
//!
//! The protocol module describes what travels between a hosting server and an
//! application, without saying anything about how bytes reach the wire:
//!
//! - **Request**: the immutable inbound request
//!   - [`Request`]: method, path, query, headers and connection metadata
//!   - [`Logger`]: the per-request diagnostic sink
//!
//! - **Response**: the three ways of producing a response
//!   - [`Response`]: file, buffer or custom stream
//!   - [`ResponseHead`]: status and headers, delivered exactly once
//!   - [`FilePart`]: a byte window of a file
//!
//! - **Streaming** ([`stream`]): the producer/consumer contract for bodies
//!   - [`ChunkSink`](stream::ChunkSink): the consumer continuation
//!   - [`pump`](stream::pump): drives a producer into a sink
//!
//! - **Bodies** ([`body`]): the concrete producers
//!
//! - **Error Handling**: [`StreamError`], [`RequestError`], [`ConfigError`]
//!   and the top-level [`WaiError`]

use http::{HeaderName, HeaderValue};

mod request;
pub use request::Logger;
pub use request::Request;
pub use request::RequestBuilder;

mod response;
pub use response::FilePart;
pub use response::Response;
pub use response::ResponseHead;
pub use response::StreamProducer;

mod error;
pub use error::ConfigError;
pub use error::RequestError;
pub use error::StreamError;
pub use error::WaiError;

pub mod body;
pub mod stream;

/// Ordered header pairs. Order and duplicated names are kept as given.
pub type HeaderList = Vec<(HeaderName, HeaderValue)>;
