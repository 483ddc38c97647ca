//! Affinity verifier.
//!
//! Runs an ordered list of [`Step`]s through a fresh
//! [`CookieTrackingTransport`] and reduces the resulting trail to a
//! [`Verdict`]. Steps run strictly one after another, since later steps
//! consume identifiers produced by earlier ones. Each session gets its own
//! transport and jar, so independent sessions may run concurrently on one
//! verifier without sharing affinity cookies.

mod scenario;
mod session;
mod step;
mod verdict;

pub use scenario::{responses_chain, FIRST_INPUT, FOLLOW_UP_INPUT, OUTPUT_TEXT_POINTER};
pub use session::{AffinitySession, StepResult};
pub use step::{Dependency, Step, DEFAULT_ID_POINTER};
pub use verdict::{Verdict, EXIT_AFFINE, EXIT_BROKEN, EXIT_INCONCLUSIVE};

use crate::config::GatewayConfig;
use crate::errors::{AffinityError, NetworkError};
use crate::net::{HttpRequest, HttpTransport, ReqwestTransport, Response};
use crate::transport::CookieTrackingTransport;
use http::header::HeaderName;
use std::sync::PoisonError;

const HEADER_API_KEY: &str = "api-key";
const PREVIEW_CHARS: usize = 100;

pub struct AffinityVerifier<T> {
    config: GatewayConfig,
    inner: T,
    multi_backend: bool,
}

impl AffinityVerifier<ReqwestTransport> {
    /// Verifier talking to the configured gateway over HTTP.
    pub fn from_config(config: GatewayConfig) -> Result<Self, NetworkError> {
        let inner = ReqwestTransport::from_config(&config)?;
        Ok(Self::new(config, inner))
    }
}

impl<T: HttpTransport> AffinityVerifier<T> {
    pub fn new(config: GatewayConfig, inner: T) -> Self {
        Self {
            config,
            inner,
            multi_backend: false,
        }
    }

    /// Marks sessions run by this verifier as spanning several backends by design.
    pub fn multi_backend(mut self, allowed: bool) -> Self {
        self.multi_backend = allowed;
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Runs `steps` as one session and classifies it.
    pub async fn run_session(&self, steps: &[Step]) -> Verdict {
        self.execute(steps).await.verdict()
    }

    /// Runs `steps` as one session and returns everything that was observed.
    pub async fn execute(&self, steps: &[Step]) -> AffinitySession {
        let transport = CookieTrackingTransport::new(&self.inner);
        let mut session = AffinitySession::new(self.config.affinity_field, self.multi_backend);
        log::info!("Session {}: {} step(s) against {}", session.id, steps.len(), self.config.gateway_url);

        if steps.is_empty() {
            session.aborted = Some(AffinityError::EmptySession);
            return session;
        }

        for (index, step) in steps.iter().enumerate() {
            log::info!("Step {}/{}: {}", index + 1, steps.len(), step.label);
            if let Err(e) = self.run_step(&transport, &mut session, index, step).await {
                log::warn!("Session {} stopped at step {}: {}", session.id, index + 1, e);
                session.aborted = Some(e);
                break;
            }
        }

        session.exchanges = transport.trail();
        session.failures = transport.failures();
        session.cookies = transport
            .jar()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cookies()
            .to_vec();
        log::info!("Session {} verdict: {}", session.id, session.verdict());

        session
    }

    async fn run_step(
        &self,
        transport: &CookieTrackingTransport<&T>,
        session: &mut AffinitySession,
        index: usize,
        step: &Step,
    ) -> Result<(), AffinityError> {
        let dependency = match &step.depends_on {
            Some(dep) => {
                let id = session
                    .steps
                    .get(dep.step)
                    .and_then(|s| s.identifier.clone())
                    .ok_or(AffinityError::UnresolvedDependency {
                        step: index,
                        reference: dep.step,
                    })?;
                Some((dep, id))
            }
            None => None,
        };

        let body = step.body_with(index, dependency.as_ref().map(|(dep, id)| (*dep, id.as_str())))?;
        let request = self.build_request(step, body);

        let (response, _) = transport
            .send_tracked(request)
            .await
            .map_err(|source| AffinityError::Network { step: index, source })?;

        if !response.is_success() {
            if let Some((_, id)) = &dependency {
                if is_dependent_not_found(&response, id) {
                    return Err(AffinityError::DependentCallNotFound {
                        step: index,
                        id: id.clone(),
                        status: response.status,
                    });
                }
            }
            log::debug!("Step {} failed with body: {}", index + 1, preview(&response.text()));
            return Err(AffinityError::UnexpectedStatus {
                step: index,
                status: response.status,
            });
        }

        let identifier = response.json_str(&step.id_pointer);
        if identifier.is_none() {
            log::debug!("Step {}: no identifier at {}", index + 1, step.id_pointer);
        }
        session.steps.push(StepResult {
            label: step.label.clone(),
            identifier,
            preview: step
                .preview_pointer
                .as_deref()
                .and_then(|p| response.json_str(p))
                .map(|text| preview(&text)),
        });

        Ok(())
    }

    fn build_request(&self, step: &Step, body: Option<serde_json::Value>) -> HttpRequest {
        let request = HttpRequest::new(step.method.clone(), self.config.endpoint(&step.path))
            .header(HeaderName::from_static(HEADER_API_KEY), &self.config.api_key);
        match body {
            Some(body) => request.json(&body),
            None => request,
        }
    }
}

/// A dependent step failing with 404, or with another client error whose body
/// says "not found" and names the identifier, means the backend that served it
/// never saw the earlier step.
fn is_dependent_not_found(response: &Response, id: &str) -> bool {
    if response.status == 404 {
        return true;
    }
    if !(400..500).contains(&response.status) {
        return false;
    }
    let body = response.text();
    body.to_ascii_lowercase().contains("not found") && body.contains(id)
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}
