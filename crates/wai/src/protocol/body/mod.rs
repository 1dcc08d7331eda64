//! Response body producers.
//!
//! All producers speak the same pull based contract, [`http_body::Body`] with
//! `Data = Bytes` and `Error = StreamError`, so the [`pump`](crate::protocol::stream::pump)
//! loop and any `http` ecosystem server can drive them alike:
//!
//! - [`BufferBody`]: a prebuilt buffer, offered once
//! - [`FileBody`]: a file or a window of it, read in bounded blocks
//! - [`ChannelBody`]: the pull side of a custom [`StreamProducer`](crate::protocol::StreamProducer)
//! - [`ResponseBody`]: any of the above behind one type
//!
//! Custom producers write through a [`Responder`] and the [`BodyWriter`] it hands out
//! once the head is sent. Writes are lock-step: a write completes only after the consumer
//! accepted the chunk, so a producer can never run ahead of its consumer.
//!
//! Every producer owns its resources. Dropping a body, which is what a consumer does when
//! it stops early, releases them.

mod buffer_body;
mod channel;
mod file_body;
mod response_body;

pub use buffer_body::BufferBody;
pub use channel::BodyWriter;
pub use channel::ChannelBody;
pub use channel::Responder;
pub use file_body::FileBody;
pub use response_body::ResponseBody;

pub(crate) use channel::body_channel;
