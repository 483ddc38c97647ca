//! Test transport that replays canned responses in order.

use crate::errors::NetworkError;
use crate::net::{HttpRequest, HttpTransport, Response};
use futures::future::BoxFuture;
use futures::FutureExt;
use http::header::{HeaderName, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<Response, NetworkError>>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<Response, NetworkError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in arrival order.
    pub fn seen(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<Response, NetworkError>> {
        let url = request.url.clone();
        self.seen.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(NetworkError::Other(format!("no scripted reply for {url}"))));

        // Canned responses answer for whatever URL was asked.
        let reply = reply.map(|mut r| {
            r.url = url;
            r
        });
        async move { reply }.boxed()
    }
}

/// Builds a canned response.
pub(crate) struct Reply {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.append(HeaderName::from_static(name), HeaderValue::from_str(value).unwrap());
        self
    }

    pub fn pool(self, pool: &str) -> Self {
        self.header("x-backend-pool", pool)
    }

    pub fn set_cookie(mut self, value: &str) -> Self {
        self.headers.append(SET_COOKIE, HeaderValue::from_str(value).unwrap());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.as_bytes().to_vec();
        self
    }

    pub fn build(self) -> Result<Response, NetworkError> {
        Ok(Response::new(
            "http://scripted.invalid/".parse().unwrap(),
            self.status,
            self.headers,
            self.body,
        ))
    }
}
