//! The application contract.
//!
//! An [`Application`] turns a [`Request`] into a [`Response`]. Calling it may suspend
//! (the `.await`), the response it returns only describes how the body is produced. The
//! hosting server realizes it afterwards, see [`crate::realize`].

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::middleware::Middleware;
use crate::protocol::{Request, Response};

#[async_trait]
pub trait Application: Send + Sync {
    async fn call(&self, request: Request) -> Response;
}

pub type BoxApplication = Box<dyn Application>;

/// An async fn holder which represents an [`Application`].
pub struct ApplicationFn<F, Fut> {
    f: F,
    _phantom: PhantomData<fn() -> Fut>,
}

/// Makes an [`Application`] out of `async fn(Request) -> Response`.
pub fn app_fn<F, Fut>(f: F) -> ApplicationFn<F, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    ApplicationFn { f, _phantom: PhantomData }
}

impl<F, Fut> fmt::Debug for ApplicationFn<F, Fut> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Application for ApplicationFn<F, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    async fn call(&self, request: Request) -> Response {
        (self.f)(request).await
    }
}

#[async_trait]
impl<A> Application for Arc<A>
where
    A: Application + ?Sized,
{
    async fn call(&self, request: Request) -> Response {
        (**self).call(request).await
    }
}

#[async_trait]
impl<A> Application for Box<A>
where
    A: Application + ?Sized,
{
    async fn call(&self, request: Request) -> Response {
        (**self).call(request).await
    }
}

/// Combinators available on every [`Application`].
pub trait ApplicationExt: Application + Sized {
    /// Wraps `self` with `middleware`.
    ///
    /// Each call adds a new outermost layer, so `app.with(a).with(b)` runs `b` first on
    /// the request and last on the response.
    fn with<M>(self, middleware: M) -> M::Out
    where
        M: Middleware<Self>,
    {
        middleware.wrap(self)
    }

    /// Erases the application type, e.g. to choose between applications at runtime.
    fn boxed(self) -> BoxApplication
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<A: Application> ApplicationExt for A {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Collect;
    use crate::realize::realize;
    use bytes::Bytes;
    use http::StatusCode;

    fn assert_is_application<A: Application>(_app: &A) {
        // no op
    }

    async fn hello(request: Request) -> Response {
        let name = request.path_segments().first().cloned().unwrap_or_default();
        Response::buffer(StatusCode::OK, Vec::new(), format!("hello {name}"))
    }

    #[test]
    fn async_fn_is_application() {
        let app = app_fn(hello);
        assert_is_application(&app);
        assert_is_application(&Arc::new(app_fn(hello)));
        assert_is_application(&app_fn(hello).boxed());
    }

    #[tokio::test]
    async fn call_then_realize() {
        let app: BoxApplication = app_fn(hello).boxed();
        let request = Request::builder().uri("/world").build().unwrap();

        let response = app.call(request).await;
        let collected = realize(response, Collect::new()).await.unwrap();

        assert_eq!(collected.head.status(), StatusCode::OK);
        assert_eq!(collected.into_body(), Bytes::from("hello world"));
    }
}
