//! Request descriptor handed to an [`HttpTransport`](super::HttpTransport).

use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use url::Url;

/// Method, target, headers and an optional fully buffered body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Sets (replacing) a header. Values that are not valid header values are dropped.
    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => log::warn!("Dropping invalid value for header {}", name),
        }
        self
    }

    /// Serializes `body` as the JSON request body.
    pub fn json(mut self, body: &serde_json::Value) -> Self {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(body.to_string().into_bytes());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::COOKIE;

    #[test]
    fn json_sets_content_type_and_body() {
        let req = HttpRequest::post("https://gw/responses".parse().unwrap())
            .json(&serde_json::json!({"input": "hi"}));

        assert_eq!(req.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(req.body.as_deref(), Some(br#"{"input":"hi"}"#.as_slice()));
    }

    #[test]
    fn invalid_header_value_is_dropped() {
        let req = HttpRequest::get("https://gw/".parse().unwrap()).header(COOKIE, "a=1\nb=2");
        assert!(req.headers.get(COOKIE).is_none());
    }
}
