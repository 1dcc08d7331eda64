//! RFC 7231 `Date` header for every response.
//!
//! Formatting a date on each response is wasted work under load, so a shared
//! [`DateService`] keeps the current value and a background task refreshes it. Without a
//! live refresh task (no runtime at creation, or the runtime shut down since) the value
//! is formatted on every read instead.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderValue;
use http::header::DATE;
use once_cell::sync::Lazy;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::handler::Application;
use crate::middleware::Middleware;
use crate::protocol::{Request, Response};

/// Maintains the current HTTP date value, refreshed by a background task.
#[derive(Debug)]
pub struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    refresh: Option<JoinHandle<()>>,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService::with_update_interval(Duration::from_millis(800)));

fn now() -> Bytes {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    Bytes::from_owner(buf)
}

impl DateService {
    /// The process wide instance.
    ///
    /// Its refresh task lives on the runtime that made the first call. Once that runtime
    /// is gone the date is still correct, it is just formatted on every read.
    pub fn global() -> &'static DateService {
        &DATE_SERVICE
    }

    /// Creates a service refreshed every `update_interval` by a task on the current runtime.
    pub fn with_update_interval(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(now()));
        let current_arc = Arc::clone(&current);

        let refresh = match Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(async move {
                loop {
                    tokio::time::sleep(update_interval).await;
                    current_arc.store(Arc::new(now()));
                }
            })),
            Err(e) => {
                debug!(cause = %e, "no tokio runtime, http date formatted on every read");
                None
            }
        };

        DateService { current, refresh }
    }

    fn is_refreshed(&self) -> bool {
        self.refresh.as_ref().is_some_and(|refresh| !refresh.is_finished())
    }

    /// The current date, formatted as an HTTP date.
    pub fn http_date(&self) -> Option<HeaderValue> {
        if !self.is_refreshed() {
            self.current.store(Arc::new(now()));
        }

        let date = self.current.load().as_ref().clone();
        match HeaderValue::from_maybe_shared(date) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(cause = %e, "invalid http date value");
                None
            }
        }
    }
}

impl Drop for DateService {
    fn drop(&mut self) {
        if let Some(refresh) = &self.refresh {
            refresh.abort();
        }
    }
}

/// Adds the `Date` header to responses, replacing any value set by the application.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateMiddleware;

#[derive(Debug)]
pub struct DateApp<A> {
    app: A,
}

impl<A: Application> Middleware<A> for DateMiddleware {
    type Out = DateApp<A>;

    fn wrap(&self, app: A) -> Self::Out {
        DateApp { app }
    }
}

#[async_trait]
impl<A: Application> Application for DateApp<A> {
    async fn call(&self, request: Request) -> Response {
        let response = self.app.call(request).await;
        let date_service = DateService::global();

        response.map_head(move |mut head| {
            if let Some(date) = date_service.http_date() {
                head.set_header(DATE, date);
            }
            head
        })
    }
}
