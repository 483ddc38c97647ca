use crate::config::GatewayConfig;
use crate::errors::NetworkError;
use crate::net::{HttpRequest, HttpTransport, Response};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;

/// [`HttpTransport`] backed by a `reqwest::Client`.
///
/// The client keeps no cookie store of its own and does not follow
/// redirects, so every routing outcome the gateway produces is observed
/// exactly once by whoever wraps this transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, NetworkError> {
        Self::new(config.timeout, &config.user_agent)
    }

    async fn fetch(&self, request: HttpRequest) -> Result<Response, NetworkError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let res = builder.send().await?;

        // Fetch results
        let final_url = res.url().clone();
        let status = res.status().as_u16();
        let headers = res.headers().clone();

        // Fetch body. We don't do streaming yet
        let body = res.bytes().await?.to_vec();

        Ok(Response::new(final_url, status, headers, body))
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<Response, NetworkError>> {
        self.fetch(request).boxed()
    }
}
