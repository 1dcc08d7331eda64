//! A backend agnostic interface between HTTP servers and applications.
//!
//! This crate defines what an application sees of a request, how it describes a
//! response, and how a server turns that description into bytes on the wire. It does not
//! parse HTTP or own sockets, any server able to hand over a request and accept a stream
//! of chunks can host an application written against it.
//!
//! # Features
//!
//! - Three response strategies: a prebuilt buffer, a file (or a byte range of it) and a
//!   custom incremental producer
//! - One consumption contract for all of them, driven by the consumer
//! - Strict backpressure: nothing is produced before the previous chunk was taken
//! - Early stop at any chunk boundary
//! - File handles released on every exit path, including errors and early stop
//! - Composable middleware
//!
//! # Example
//!
//! ```no_run
//! use http::StatusCode;
//! use micro_wai::consumer::WriteBody;
//! use micro_wai::handler::{app_fn, Application, ApplicationExt};
//! use micro_wai::middleware::{DateMiddleware, RequestLogging};
//! use micro_wai::protocol::{Request, Response, ResponseHead};
//! use micro_wai::realize::Realizer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = app_fn(hello_world).with(DateMiddleware).with(RequestLogging);
//!
//!     let request = Request::builder().uri("/hello?name=wai").build().unwrap();
//!     let response = app.call(request).await;
//!
//!     let consumer = WriteBody::new(tokio::io::stdout(), |head: &ResponseHead| {
//!         eprintln!("status: {}", head.status());
//!     });
//!     Realizer::default().realize(response, consumer).await.unwrap();
//! }
//!
//! async fn hello_world(request: Request) -> Response {
//!     let name = request.query_value("name").unwrap_or("world").to_string();
//!     Response::buffer(StatusCode::OK, Vec::new(), format!("Hello {name}!\r\n"))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: request, response, the chunk stream contract and the body producers
//! - [`realize`]: turns a response into a head and a chunk stream
//! - [`consumer`]: ready made consumers
//! - [`handler`]: the application contract
//! - [`middleware`]: application wrappers
//! - [`config`]: streaming tunables
//!
//! # Streaming
//!
//! A consumer is a continuation: after each chunk it answers with a
//! [`Flow`](protocol::stream::Flow), and production goes on only on
//! [`Flow::Continue`](protocol::stream::Flow::Continue). File and buffer bodies are pull
//! based [`http_body::Body`] implementations, custom producers write through a
//! [`BodyWriter`](protocol::body::BodyWriter) whose every write waits for the consumer.

pub mod config;
pub mod consumer;
pub mod handler;
pub mod middleware;
pub mod protocol;
pub mod realize;

mod utils;
pub(crate) use utils::ensure;

pub use handler::Application;
pub use protocol::{Request, Response, ResponseHead};
pub use realize::Realizer;
