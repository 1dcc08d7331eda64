//! Middleware: functions from an application to an application.
//!
//! A middleware may rewrite the request before calling the wrapped application, rewrite
//! the response after it, or both. Wrapping nests: the middleware applied last sees the
//! request first and the response last.
//!
//! Any `Fn(A) -> B` where `B` is an [`Application`] is a middleware, so most of them are
//! plain closures. [`Stack`] composes several of them into one.

mod date;
mod logging;

pub use date::DateApp;
pub use date::DateMiddleware;
pub use date::DateService;
pub use logging::LoggingApp;
pub use logging::RequestLogging;

use crate::handler::Application;

/// Wraps an application into another one.
pub trait Middleware<A> {
    /// the wrapped application
    type Out: Application;

    fn wrap(&self, app: A) -> Self::Out;
}

impl<F, A, B> Middleware<A> for F
where
    F: Fn(A) -> B,
    B: Application,
{
    type Out = B;

    #[inline]
    fn wrap(&self, app: A) -> Self::Out {
        (self)(app)
    }
}

/// A middleware that does not do any wrapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<A: Application> Middleware<A> for Identity {
    type Out = A;

    #[inline]
    fn wrap(&self, app: A) -> Self::Out {
        app
    }
}

/// Two middlewares applied one after the other, `inner` first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stack<Inner, Outer> {
    inner: Inner,
    outer: Outer,
}

impl Stack<Identity, Identity> {
    pub fn identity() -> Self {
        Self { inner: Identity, outer: Identity }
    }
}

impl<Inner, Outer> Stack<Inner, Outer> {
    pub fn new(inner: Inner, outer: Outer) -> Self {
        Self { inner, outer }
    }

    /// Adds a middleware on top of the stack, it will wrap at last.
    pub fn and_then<M>(self, middleware: M) -> Stack<Self, M> {
        Stack { inner: self, outer: middleware }
    }
}

impl<A, Inner, Outer> Middleware<A> for Stack<Inner, Outer>
where
    Inner: Middleware<A>,
    Outer: Middleware<Inner::Out>,
{
    type Out = Outer::Out;

    fn wrap(&self, app: A) -> Self::Out {
        let app = self.inner.wrap(app);
        self.outer.wrap(app)
    }
}
