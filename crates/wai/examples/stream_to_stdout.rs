use std::env;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use micro_wai::config::StreamConfig;
use micro_wai::consumer::WriteBody;
use micro_wai::handler::{Application, ApplicationExt, app_fn};
use micro_wai::middleware::{DateMiddleware, RequestLogging};
use micro_wai::protocol::{FilePart, Request, Response, ResponseHead, WaiError};
use micro_wai::realize::Realizer;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

async fn route(request: Request) -> Response {
    match request.path_segments().first().map(String::as_str) {
        Some("file") => {
            let Some(path) = request.query_value("path") else {
                return Response::buffer(StatusCode::BAD_REQUEST, Vec::new(), "missing path\n");
            };
            let offset = request.query_value("offset").and_then(|v| v.parse().ok());
            let count = request.query_value("count").and_then(|v| v.parse().ok());
            match (offset, count) {
                (Some(offset), Some(count)) => Response::file_part(StatusCode::PARTIAL_CONTENT, Vec::new(), path, FilePart::new(offset, count)),
                _ => Response::file(StatusCode::OK, Vec::new(), path),
            }
        }

        Some("count") => Response::stream(|responder| async move {
            let mut head = ResponseHead::new(StatusCode::OK);
            head.append_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            let mut writer = responder.start(head);
            for i in 1..=10 {
                if writer.send(format!("{i}\n")).await.is_stop() {
                    break;
                }
            }
            Ok(())
        }),

        _ => {
            let body = "hello world\n";
            let headers = vec![(CONTENT_LENGTH, HeaderValue::from(body.len()))];
            Response::buffer(StatusCode::OK, headers, body)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), WaiError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).with_writer(std::io::stderr).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // e.g. `/count` or `/file?path=Cargo.toml&offset=0&count=64`
    let uri = env::args().nth(1).unwrap_or_else(|| "/".to_string());
    let request = Request::builder().uri(uri).build()?;

    let app = app_fn(route).with(DateMiddleware).with(RequestLogging);
    let response = app.call(request).await;

    let consumer = WriteBody::new(tokio::io::stdout(), |head: &ResponseHead| {
        info!(status = %head.status(), headers = ?head.headers(), "response head");
    });

    let config = StreamConfig::builder().block_size(16 * 1024).build()?;
    let written = Realizer::new(config).realize(response, consumer).await.inspect_err(|e| error!(cause = %e, "response failed"))?;
    if let Some(e) = &written.aborted {
        error!(cause = %e, status = %written.head.status(), "response aborted");
    }
    info!(bytes = written.bytes_written, end = ?written.end, "response finished");
    Ok(())
}
