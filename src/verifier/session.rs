use crate::config::AffinityField;
use crate::cookies::Cookie;
use crate::errors::AffinityError;
use crate::transport::{Exchange, FailedRequest};
use crate::verifier::Verdict;
use uuid::Uuid;

/// What a step produced, beyond its routing metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub label: String,
    pub identifier: Option<String>,
    pub preview: Option<String>,
}

/// One logical conversation: every exchange issued for it, in order.
#[derive(Debug, Clone)]
pub struct AffinitySession {
    pub id: Uuid,
    pub field: AffinityField,
    /// Sessions that are allowed to span several backends skip the consistency check.
    pub multi_backend: bool,
    pub exchanges: Vec<Exchange>,
    /// Requests that never got a response.
    pub failures: Vec<FailedRequest>,
    pub steps: Vec<StepResult>,
    /// Jar contents when the session closed.
    pub cookies: Vec<Cookie>,
    /// Error that stopped the session before all steps ran.
    pub aborted: Option<AffinityError>,
}

impl AffinitySession {
    pub fn new(field: AffinityField, multi_backend: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            field,
            multi_backend,
            exchanges: Vec::new(),
            failures: Vec::new(),
            steps: Vec::new(),
            cookies: Vec::new(),
            aborted: None,
        }
    }

    /// Derives the verdict. Pure: calling it twice gives the same answer.
    ///
    /// Network failures and dependent not-found decide the verdict on their
    /// own. Any other early stop still lets the recorded exchanges speak
    /// first; its reason is used only when they are consistent.
    pub fn verdict(&self) -> Verdict {
        let recorded = self.check_consistency();
        let Some(stop) = &self.aborted else {
            return match recorded {
                Ok(()) => Verdict::Affine,
                Err(error) => Verdict::from_error(error),
            };
        };

        match (stop, recorded) {
            (AffinityError::UnexpectedStatus { .. } | AffinityError::UnresolvedDependency { .. }, Err(found))
                if found != AffinityError::EmptySession =>
            {
                Verdict::from_error(found)
            }
            _ => Verdict::from_error(stop.clone()),
        }
    }

    /// Distinct backend identifiers, in the order they were first seen.
    pub fn backends(&self) -> Vec<&str> {
        let header = self.field.header_name();
        let mut seen: Vec<&str> = Vec::new();
        for exchange in &self.exchanges {
            if let Some(value) = exchange.response.field(header) {
                if exchange.response.has_field(header) && !seen.contains(&value) {
                    seen.push(value);
                }
            }
        }
        seen
    }

    fn check_consistency(&self) -> Result<(), AffinityError> {
        if self.exchanges.is_empty() {
            return Err(AffinityError::EmptySession);
        }

        let header = self.field.header_name();
        if let Some(step) = self.exchanges.iter().position(|e| !e.response.has_field(header)) {
            return Err(AffinityError::MissingRoutingMetadata { step, field: header });
        }

        let backends = self.backends();
        if backends.len() > 1 && !self.multi_backend {
            return Err(AffinityError::BackendMismatch {
                observed: backends.into_iter().map(str::to_string).collect(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RequestRecord, ResponseRecord, HEADER_BACKEND_POOL, HEADER_REGION};
    use http::{HeaderMap, HeaderValue, Method};
    use time::OffsetDateTime;

    fn exchange(headers: &[(&'static str, &'static str)]) -> Exchange {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        Exchange {
            request: RequestRecord {
                timestamp: OffsetDateTime::UNIX_EPOCH,
                method: Method::POST,
                url: "https://gw/r".parse().unwrap(),
                cookie: None,
            },
            response: ResponseRecord::from_headers(200, &map),
        }
    }

    fn session(pools: &[Option<&'static str>]) -> AffinitySession {
        let mut s = AffinitySession::new(AffinityField::BackendPool, false);
        s.exchanges = pools
            .iter()
            .map(|p| match p {
                Some(pool) => exchange(&[(HEADER_BACKEND_POOL, pool)]),
                None => exchange(&[]),
            })
            .collect();
        s
    }

    #[test]
    fn identical_pools_are_affine() {
        for n in 1..5 {
            let pools = vec![Some("pool-A"); n];
            assert_eq!(session(&pools).verdict(), Verdict::Affine);
        }
    }

    #[test]
    fn any_differing_pool_is_a_mismatch() {
        for odd in 0..4 {
            let mut pools = vec![Some("pool-A"); 4];
            pools[odd] = Some("pool-B");

            let verdict = session(&pools).verdict();

            assert!(verdict.is_broken(), "position {odd}");
            assert_eq!(verdict.to_string(), "BROKEN(backend mismatch)");
        }
    }

    #[test]
    fn missing_pool_is_inconclusive_regardless_of_others() {
        let cases: [&[Option<&'static str>]; 3] = [
            &[None],
            &[Some("pool-A"), None, Some("pool-A")],
            &[Some("pool-A"), Some("pool-B"), None],
        ];
        for pools in cases {
            let verdict = session(pools).verdict();
            assert!(
                matches!(verdict, Verdict::Inconclusive(AffinityError::MissingRoutingMetadata { .. })),
                "{pools:?} gave {verdict}"
            );
        }
    }

    #[test]
    fn literal_unknown_header_value_is_still_present() {
        let verdict = session(&[Some("unknown"), Some("unknown")]).verdict();
        assert_eq!(verdict, Verdict::Affine);
    }

    #[test]
    fn region_field_compares_region_header() {
        let mut s = AffinitySession::new(AffinityField::Region, false);
        s.exchanges = vec![
            exchange(&[(HEADER_REGION, "eastus2"), (HEADER_BACKEND_POOL, "pool-A")]),
            exchange(&[(HEADER_REGION, "eastus2"), (HEADER_BACKEND_POOL, "pool-B")]),
        ];
        assert_eq!(s.verdict(), Verdict::Affine);

        s.exchanges.push(exchange(&[(HEADER_REGION, "westeurope")]));
        assert_eq!(s.backends(), vec!["eastus2", "westeurope"]);
        assert!(s.verdict().is_broken());
    }

    #[test]
    fn multi_backend_session_tolerates_differences() {
        let mut s = session(&[Some("pool-A"), Some("pool-B")]);
        s.multi_backend = true;
        assert_eq!(s.verdict(), Verdict::Affine);
    }

    #[test]
    fn aborted_session_uses_abort_reason() {
        let mut s = session(&[Some("pool-A")]);
        s.aborted = Some(AffinityError::DependentCallNotFound {
            step: 1,
            id: "resp_1".into(),
            status: 404,
        });
        assert_eq!(s.verdict().to_string(), "BROKEN(dependent identifier not found on backend)");
    }

    #[test]
    fn throttled_second_pool_is_a_mismatch() {
        let mut s = session(&[Some("pool-A")]);
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_BACKEND_POOL, HeaderValue::from_static("pool-B"));
        s.exchanges.push(Exchange {
            response: ResponseRecord::from_headers(429, &headers),
            ..exchange(&[])
        });
        s.aborted = Some(AffinityError::UnexpectedStatus { step: 1, status: 429 });

        assert_eq!(
            s.verdict(),
            Verdict::Broken(AffinityError::BackendMismatch {
                observed: vec!["pool-A".into(), "pool-B".into()]
            })
        );
    }

    #[test]
    fn failed_status_without_routing_header_is_missing_metadata() {
        let mut s = session(&[Some("pool-A"), None]);
        s.aborted = Some(AffinityError::UnexpectedStatus { step: 1, status: 503 });

        assert!(matches!(
            s.verdict(),
            Verdict::Inconclusive(AffinityError::MissingRoutingMetadata { step: 1, .. })
        ));
    }

    #[test]
    fn consistent_trail_keeps_the_stop_reason() {
        let mut s = session(&[Some("pool-A"), Some("pool-A")]);
        s.aborted = Some(AffinityError::UnexpectedStatus { step: 1, status: 500 });
        assert_eq!(s.verdict(), Verdict::Inconclusive(AffinityError::UnexpectedStatus { step: 1, status: 500 }));

        let mut unsent = session(&[]);
        unsent.aborted = Some(AffinityError::UnresolvedDependency { step: 0, reference: 3 });
        assert_eq!(
            unsent.verdict(),
            Verdict::Inconclusive(AffinityError::UnresolvedDependency { step: 0, reference: 3 })
        );
    }

    #[test]
    fn network_abort_wins_over_mismatch() {
        let mut s = session(&[Some("pool-A"), Some("pool-B")]);
        s.aborted = Some(AffinityError::Network {
            step: 2,
            source: crate::errors::NetworkError::Timeout("30s".into()),
        });
        assert!(s.verdict().is_inconclusive());
    }

    #[test]
    fn empty_session_is_inconclusive() {
        assert_eq!(session(&[]).verdict(), Verdict::Inconclusive(AffinityError::EmptySession));
    }
}
