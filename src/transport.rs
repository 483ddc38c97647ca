//! Cookie-tracking transport.
//!
//! [`CookieTrackingTransport`] decorates any [`HttpTransport`]: it attaches
//! the jar's cookies to every outgoing request, merges every `Set-Cookie` of
//! every response back into the jar, and records a
//! [`RequestRecord`]/[`ResponseRecord`] pair per call in the diagnostic trail.
//! The response handed back to the caller is the inner transport's response,
//! untouched.

mod records;

pub use records::{
    Exchange, FailedRequest, RequestRecord, ResponseRecord, HEADER_BACKEND_POOL, HEADER_REGION, HEADER_REQUEST_ID,
    HEADER_ROUTING_DECISION, HEADER_SESSION_ID, SENTINEL_NONE, SENTINEL_UNKNOWN,
};

use crate::cookies::{CookieJar, CookieJarHandle};
use crate::errors::NetworkError;
use crate::net::{HttpRequest, HttpTransport, Response};
use futures::future::BoxFuture;
use futures::FutureExt;
use http::header::COOKIE;
use http::HeaderValue;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;

pub struct CookieTrackingTransport<T> {
    inner: T,
    jar: CookieJarHandle,
    trail: Mutex<Vec<Exchange>>,
    failures: Mutex<Vec<FailedRequest>>,
}

impl<T: HttpTransport> CookieTrackingTransport<T> {
    /// Wraps `inner` with a fresh, empty jar.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            jar: CookieJar::new().into_handle(),
            trail: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn jar(&self) -> CookieJarHandle {
        self.jar.clone()
    }

    /// Snapshot of every exchange recorded so far, in completion order.
    pub fn trail(&self) -> Vec<Exchange> {
        self.trail.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Requests that failed before any response arrived, with their errors.
    pub fn failures(&self) -> Vec<FailedRequest> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Sends `request` and returns the untouched response together with the
    /// exchange that was appended to the trail.
    pub async fn send_tracked(&self, mut request: HttpRequest) -> Result<(Response, Exchange), NetworkError> {
        let jar_cookies = {
            let jar = self.jar.read().unwrap_or_else(PoisonError::into_inner);
            jar.request_cookies(&request.url, OffsetDateTime::now_utc())
        };
        let cookie_header = merge_cookie_header(&request, jar_cookies);

        request.headers.remove(COOKIE);
        if let Some(header) = &cookie_header {
            match HeaderValue::from_str(header) {
                Ok(v) => {
                    request.headers.insert(COOKIE, v);
                }
                Err(_) => log::warn!("Cookie header for {} is not a valid header value; sending none", request.url),
            }
        }

        let request_record = RequestRecord {
            timestamp: OffsetDateTime::now_utc(),
            method: request.method.clone(),
            url: request.url.clone(),
            cookie: cookie_header,
        };
        log::info!(
            "Request {} {} cookies: {}",
            request_record.method,
            request_record.url,
            request_record.cookie.as_deref().unwrap_or("None")
        );

        let response = match self.inner.send(request).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Request {} {} failed: {}", request_record.method, request_record.url, e);
                self.failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(FailedRequest {
                        request: request_record,
                        error: e.clone(),
                    });
                return Err(e);
            }
        };

        {
            let mut jar = self.jar.write().unwrap_or_else(PoisonError::into_inner);
            let errors = jar.store_response_cookies(&request_record.url, &response.headers, OffsetDateTime::now_utc());
            for e in errors {
                log::warn!("Skipping set-cookie from {}: {}", request_record.url, e);
            }
        }

        let response_record = ResponseRecord::from_response(&response);
        for cookie in &response_record.set_cookies {
            log::info!("Response set-cookie: {}", cookie);
        }
        log::info!(
            "Status: {}, Backend: {}, Session: {}, Request: {}",
            response_record.status,
            response_record.backend_pool,
            response_record.session_id,
            response_record.request_id
        );
        log::info!("Region: {}, Routing: {}", response_record.region, response_record.routing_decision);

        let exchange = Exchange {
            request: request_record,
            response: response_record,
        };
        self.trail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(exchange.clone());

        Ok((response, exchange))
    }
}

impl<T: HttpTransport> HttpTransport for CookieTrackingTransport<T> {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<Response, NetworkError>> {
        async move { self.send_tracked(request).await.map(|(response, _)| response) }.boxed()
    }
}

/// Combines the caller's `Cookie` header(s) with the jar's cookies. Jar
/// entries win over caller-supplied ones with the same name and every name
/// appears at most once.
fn merge_cookie_header(request: &HttpRequest, jar_cookies: Vec<(String, String)>) -> Option<String> {
    let caller_cookies = request
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .filter(|(name, _)| !name.is_empty());

    let mut seen = HashSet::new();
    let merged: Vec<String> = jar_cookies
        .into_iter()
        .chain(caller_cookies)
        .filter(|(name, _)| seen.insert(name.clone()))
        .map(|(name, value)| format!("{name}={value}"))
        .collect();

    if merged.is_empty() {
        None
    } else {
        Some(merged.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::scripted::{Reply, ScriptedTransport};
    use std::sync::Arc;

    fn post(u: &str) -> HttpRequest {
        HttpRequest::post(u.parse().unwrap())
    }

    fn sent_cookie(req: &HttpRequest) -> Option<String> {
        req.headers.get(COOKIE).map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn set_cookie_is_replayed_on_next_request() {
        let transport = CookieTrackingTransport::new(ScriptedTransport::new(vec![
            Reply::ok().set_cookie("sid=abc123; Path=/").build(),
            Reply::ok().build(),
        ]));

        transport.send(post("https://gw/responses")).await.unwrap();
        transport.send(post("https://gw/responses")).await.unwrap();

        let seen = transport.inner().seen();
        assert_eq!(sent_cookie(&seen[0]), None);
        assert_eq!(sent_cookie(&seen[1]).as_deref(), Some("sid=abc123"));
    }

    #[tokio::test]
    async fn all_set_cookie_headers_are_merged() {
        let transport = CookieTrackingTransport::new(ScriptedTransport::new(vec![
            Reply::ok().set_cookie("sid=abc; Path=/").set_cookie("affinity=xyz; Path=/").build(),
            Reply::ok().build(),
        ]));

        transport.send(post("https://gw/responses")).await.unwrap();
        transport.send(post("https://gw/responses")).await.unwrap();

        let cookie = sent_cookie(&transport.inner().seen()[1]).unwrap();
        assert!(cookie.contains("sid=abc"));
        assert!(cookie.contains("affinity=xyz"));
    }

    #[tokio::test]
    async fn jar_overrides_caller_cookie_with_same_name() {
        let transport = CookieTrackingTransport::new(ScriptedTransport::new(vec![
            Reply::ok().set_cookie("sid=from-jar; Path=/").build(),
            Reply::ok().build(),
        ]));

        transport.send(post("https://gw/r")).await.unwrap();
        let req = post("https://gw/r").header(COOKIE, "sid=from-caller; theme=dark");
        transport.send(req).await.unwrap();

        assert_eq!(
            sent_cookie(&transport.inner().seen()[1]).as_deref(),
            Some("sid=from-jar; theme=dark")
        );
    }

    #[tokio::test]
    async fn caller_cookie_passes_through_when_jar_is_empty() {
        let transport = CookieTrackingTransport::new(ScriptedTransport::new(vec![Reply::ok().build()]));

        transport.send(post("https://gw/r").header(COOKIE, "a=1; a=2")).await.unwrap();

        assert_eq!(sent_cookie(&transport.inner().seen()[0]).as_deref(), Some("a=1"));
    }

    #[tokio::test]
    async fn records_diagnostic_headers_with_sentinels() {
        let transport = CookieTrackingTransport::new(ScriptedTransport::new(vec![
            Reply::ok()
                .pool("pool-A")
                .header("x-ms-region", "swedencentral")
                .header("x-request-id", "req-1")
                .build(),
            Reply::ok().build(),
        ]));

        let (_, first) = transport.send_tracked(post("https://gw/r")).await.unwrap();
        let (_, second) = transport.send_tracked(post("https://gw/r")).await.unwrap();

        assert_eq!(first.response.backend_pool, "pool-A");
        assert_eq!(first.response.region, "swedencentral");
        assert_eq!(first.response.request_id, "req-1");
        assert_eq!(first.response.session_id, SENTINEL_NONE);
        assert_eq!(first.response.routing_decision, SENTINEL_UNKNOWN);

        assert_eq!(second.response.backend_pool, SENTINEL_UNKNOWN);
        assert!(!second.response.has_field(HEADER_BACKEND_POOL));

        assert_eq!(transport.trail().len(), 2);
    }

    #[tokio::test]
    async fn response_is_returned_untouched() {
        let transport = CookieTrackingTransport::new(ScriptedTransport::new(vec![Reply::status(404)
            .set_cookie("sid=1")
            .body(r#"{"error":"not found"}"#)
            .build()]));

        let response = transport.send(post("https://gw/r")).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.text(), r#"{"error":"not found"}"#);
        assert_eq!(response.headers.get_all(http::header::SET_COOKIE).iter().count(), 1);
    }

    #[tokio::test]
    async fn network_error_is_forwarded_without_an_exchange() {
        let transport = CookieTrackingTransport::new(ScriptedTransport::new(vec![Err(NetworkError::Timeout(
            "deadline elapsed".into(),
        ))]));

        let err = transport.send(post("https://gw/r")).await.unwrap_err();

        assert_eq!(err, NetworkError::Timeout("deadline elapsed".into()));
        assert!(transport.trail().is_empty());
    }

    #[tokio::test]
    async fn failed_request_keeps_the_cookies_it_carried() {
        let transport = CookieTrackingTransport::new(ScriptedTransport::new(vec![
            Reply::ok().set_cookie("sid=abc; Path=/").build(),
            Err(NetworkError::Connect("connection reset".into())),
        ]));

        transport.send(post("https://gw/r")).await.unwrap();
        transport.send(post("https://gw/r")).await.unwrap_err();

        let failures = transport.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].request.cookie.as_deref(), Some("sid=abc"));
        assert_eq!(failures[0].error, NetworkError::Connect("connection reset".into()));
        assert_eq!(transport.trail().len(), 1);
    }

    #[tokio::test]
    async fn malformed_set_cookie_does_not_fail_the_call() {
        let transport = CookieTrackingTransport::new(ScriptedTransport::new(vec![
            Reply::ok().set_cookie("garbage").set_cookie("sid=ok").build(),
        ]));

        let (_, exchange) = transport.send_tracked(post("https://gw/r")).await.unwrap();

        assert_eq!(exchange.response.set_cookies, vec!["garbage".to_string(), "sid=ok".to_string()]);
        assert_eq!(transport.jar().read().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_consistent_jar() {
        let replies = (0..16)
            .map(|i| Reply::ok().set_cookie(&format!("c{i}={i}; Path=/")).build())
            .collect();
        let transport = Arc::new(CookieTrackingTransport::new(ScriptedTransport::new(replies)));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let t = transport.clone();
                tokio::spawn(async move { t.send(post("https://gw/r")).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(transport.jar().read().unwrap().len(), 16);
        assert_eq!(transport.trail().len(), 16);
    }
}
