use std::time::Instant;

use async_trait::async_trait;

use crate::handler::Application;
use crate::middleware::Middleware;
use crate::protocol::{Request, Response};

/// Reports one line per request through the request's [`Logger`](crate::protocol::Logger):
/// method, raw path, final status and the time it took until the head was decided.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogging;

#[derive(Debug)]
pub struct LoggingApp<A> {
    app: A,
}

impl<A: Application> Middleware<A> for RequestLogging {
    type Out = LoggingApp<A>;

    fn wrap(&self, app: A) -> Self::Out {
        LoggingApp { app }
    }
}

#[async_trait]
impl<A: Application> Application for LoggingApp<A> {
    async fn call(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.raw_path().to_string();
        let logger = request.logger().clone();

        let response = self.app.call(request).await;

        // stream heads are only known once the producer starts
        response.map_head(move |head| {
            logger.log(&format!("{method} {path} {} {:?}", head.status().as_u16(), start.elapsed()));
            head
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Collect;
    use crate::handler::{ApplicationExt, app_fn};
    use crate::protocol::{Logger, ResponseHead};
    use crate::realize::realize;
    use http::{Method, StatusCode};
    use std::sync::{Arc, Mutex};

    fn capture() -> (Logger, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        (Logger::new(move |message| captured.lock().unwrap().push(message.to_string())), lines)
    }

    #[tokio::test]
    async fn logs_method_path_and_status() {
        let (logger, lines) = capture();
        let app = app_fn(|_request: Request| async { Response::buffer(StatusCode::NOT_FOUND, Vec::new(), "") }).with(RequestLogging);

        let request = Request::builder().method(Method::DELETE).uri("/items/7?force=1").logger(logger).build().unwrap();
        app.call(request).await;

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("DELETE /items/7 404 "), "{}", lines[0]);
    }

    #[tokio::test]
    async fn stream_is_logged_when_it_starts() {
        let (logger, lines) = capture();
        let app = app_fn(|_request: Request| async {
            Response::stream(|responder| async move {
                let mut writer = responder.start(ResponseHead::new(StatusCode::CREATED));
                writer.send("done").await;
                Ok(())
            })
        })
        .with(RequestLogging);

        let response = app.call(Request::builder().uri("/jobs").logger(logger).build().unwrap()).await;
        assert!(lines.lock().unwrap().is_empty());

        realize(response, Collect::new()).await.unwrap();
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("GET /jobs 201 "), "{}", lines[0]);
    }
}
