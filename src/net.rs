//! Network boundary of the harness.
//!
//! Everything above this module talks to the network through the
//! [`HttpTransport`] capability: hand it an [`HttpRequest`], get a fully
//! buffered [`Response`] back. [`ReqwestTransport`] is the production
//! implementation; the cookie-tracking transport in
//! [`crate::transport`] decorates any implementation of the trait.

mod fetch;
mod request;
mod response;

#[cfg(test)]
pub(crate) mod scripted;

pub use fetch::ReqwestTransport;
pub use request::HttpRequest;
pub use response::Response;

use crate::errors::NetworkError;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Issue one HTTP request and receive status, headers and body.
///
/// Implementations must not retry and must surface connection, DNS and
/// timeout failures as [`NetworkError`]. Non-success HTTP statuses are *not*
/// errors at this level.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<Response, NetworkError>>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<Response, NetworkError>> {
        (**self).send(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<Response, NetworkError>> {
        (**self).send(request)
    }
}
