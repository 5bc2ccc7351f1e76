//! Check-access client: bypass gate, concurrent dispatch, deny-dominant
//! aggregation

use crate::bypass;
use crate::cache::{self, DecisionStore};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::remote::pool::{ConnectionPool, REMAINING_QUOTA_HEADER};
use crate::remote::types::{convert_check_access_response, CheckAccessRequest, RemoteVerdict};
use crate::review::{AccessReviewSpec, ReviewStatus};
use crate::token::{self, TokenManager};
use crate::translate::{self, ClusterType};
use metrics::{counter, histogram};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use url::Url;

const CHECK_ACCESS_PATH: &str = "providers/AccessPolicy/checkaccess";
const CHECK_ACCESS_API_VERSION: &str = "2024-02-01";

/// The access-decision engine consumed by the webhook layer.
pub struct CheckAccessClient {
    endpoint: Url,
    resource_id: String,
    cluster_type: ClusterType,
    batch_size: usize,
    use_namespace_scope: bool,
    allow_discovery_paths: bool,
    skip_principals: HashSet<String>,
    base_headers: HeaderMap,
    pool: Arc<ConnectionPool>,
    tokens: TokenManager,
}

impl CheckAccessClient {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = Url::parse(&config.policy.endpoint)
            .map_err(|e| AppError::InvalidRequest(format!("invalid policy endpoint: {e}")))?;

        let provider = token::provider_for(config.mode, &config.token)?;
        let tokens = TokenManager::new(provider, config.token.scope.clone());

        let pool = Arc::new(ConnectionPool::new(
            Duration::from_secs(config.policy.remote_timeout_secs),
            config.policy.quota_floor,
        )?);

        let mut base_headers = HeaderMap::new();
        base_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let user_agent = format!(
            "warden/{}-{}",
            env!("CARGO_PKG_VERSION"),
            config.mode.as_str()
        );
        base_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid user agent: {e}")))?,
        );

        Ok(Self {
            endpoint,
            resource_id: config.policy.resource_id.clone(),
            cluster_type: ClusterType::from(config.mode),
            batch_size: config.policy.batch_size,
            use_namespace_scope: config.policy.use_namespace_scope,
            allow_discovery_paths: config.policy.allow_discovery_paths,
            skip_principals: bypass::build_skip_set(&config.policy.skip_principals),
            base_headers,
            pool,
            tokens,
        })
    }

    /// True when a bypass rule short-circuits the whole check.
    pub fn should_skip(&self, spec: &AccessReviewSpec) -> bool {
        bypass::skip_principal(spec, self.cluster_type, &self.skip_principals)
            || bypass::allow_discovery_path(spec, self.allow_discovery_paths)
    }

    /// Prior decision for this spec, if the store holds one. Consulted by
    /// the caller before `check_access`; never from the dispatch path.
    pub fn cached_decision(&self, spec: &AccessReviewSpec, store: &dyn DecisionStore) -> Option<bool> {
        let key = cache::fingerprint(spec);
        let found = store.get(&key);
        if let Some(allowed) = found {
            debug!(%key, allowed, "decision cache hit");
        }
        found
    }

    /// Record a decision for this spec.
    pub fn store_decision(
        &self,
        spec: &AccessReviewSpec,
        allowed: bool,
        store: &dyn DecisionStore,
    ) -> Result<()> {
        let key = cache::fingerprint(spec);
        debug!(%key, allowed, "caching decision");
        store.set(&key, allowed)
    }

    /// Evaluate one access review against the remote policy service.
    pub async fn check_access(&self, spec: &AccessReviewSpec) -> Result<ReviewStatus> {
        if bypass::skip_principal(spec, self.cluster_type, &self.skip_principals) {
            info!(user = %spec.user, "skipping authorization check for configured principal");
            return Ok(ReviewStatus::allowed("configured principal bypass"));
        }
        if bypass::allow_discovery_path(spec, self.allow_discovery_paths) {
            debug!(user = %spec.user, "allowing discovery path access");
            return Ok(ReviewStatus::allowed("discovery path access"));
        }

        let bodies = translate::prepare_check_access_requests(
            spec,
            self.cluster_type,
            &self.resource_id,
            self.use_namespace_scope,
            self.batch_size,
        )?;
        let url = self.check_access_url(spec)?;

        self.tokens.ensure_fresh().await?;
        let mut headers = self.base_headers.clone();
        headers.extend(self.tokens.bearer_headers().await?);

        if bodies.len() > 1 {
            debug!(count = bodies.len(), "dispatching multiple check access requests");
        }

        let mut workers = JoinSet::new();
        for body in bodies {
            let client = self.pool.handle().await;
            let pool = Arc::clone(&self.pool);
            let headers = headers.clone();
            let url = url.clone();
            workers.spawn(async move { send_check_access(client, pool, url, headers, body).await });
        }

        // Deny-dominant, first-error-wins fold over results as they land.
        // Returning early drops the set and aborts every in-flight worker.
        let mut last_allowed: Option<RemoteVerdict> = None;
        while let Some(joined) = workers.join_next().await {
            let verdict = match joined {
                Ok(result) => result?,
                Err(e) if e.is_cancelled() => {
                    return Err(AppError::Canceled(
                        "check access worker canceled".to_string(),
                    ))
                }
                Err(e) => {
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "check access worker panicked: {e}"
                    )))
                }
            };
            if !verdict.allowed {
                workers.abort_all();
                return Ok(status_from(verdict));
            }
            last_allowed = Some(verdict);
        }

        match last_allowed {
            Some(verdict) => Ok(status_from(verdict)),
            None => Err(AppError::InvalidRequest(
                "spec produced no check access requests".to_string(),
            )),
        }
    }

    fn check_access_url(&self, spec: &AccessReviewSpec) -> Result<Url> {
        let mut path = self.resource_id.trim_matches('/').to_string();
        if let Some(ns) = translate::namespace_scope(spec, self.use_namespace_scope) {
            path = format!("{path}/{ns}");
        }

        let joined = format!(
            "{}/{}/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            path,
            CHECK_ACCESS_PATH
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| AppError::InvalidRequest(format!("invalid check access URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("api-version", CHECK_ACCESS_API_VERSION);
        Ok(url)
    }
}

fn status_from(verdict: RemoteVerdict) -> ReviewStatus {
    ReviewStatus {
        allowed: verdict.allowed,
        denied: (!verdict.allowed).then_some(true),
        reason: verdict.reason,
        evaluation_error: None,
    }
}

/// The aggregation rule applied by `check_access`: any failure wins over
/// every verdict, any denial wins over every allow, otherwise the last
/// allow stands. Associative and commutative in the final ALLOW/DENY
/// verdict, so worker completion order never changes the decision.
#[cfg(test)]
fn aggregate_verdicts(
    results: impl IntoIterator<Item = Result<RemoteVerdict>>,
) -> Result<RemoteVerdict> {
    let mut last_allowed = None;
    for result in results {
        let verdict = result?;
        if !verdict.allowed {
            return Ok(verdict);
        }
        last_allowed = Some(verdict);
    }
    last_allowed.ok_or_else(|| {
        AppError::InvalidRequest("spec produced no check access requests".to_string())
    })
}

async fn send_check_access(
    client: reqwest::Client,
    pool: Arc<ConnectionPool>,
    url: Url,
    headers: HeaderMap,
    body: CheckAccessRequest,
) -> Result<RemoteVerdict> {
    let payload = serde_json::to_vec(&body)
        .map_err(|e| AppError::Transport(format!("error encoding check access request: {e}")))?;

    debug!(url = %url, actions = body.actions.len(), "sending check access request");
    let start = Instant::now();
    let response = match client.post(url).headers(headers).body(payload).send().await {
        Ok(response) => response,
        Err(e) => {
            let code = StatusCode::INTERNAL_SERVER_ERROR.as_u16().to_string();
            counter!("warden_checkaccess_requests_total", "code" => code.clone()).increment(1);
            histogram!("warden_checkaccess_duration_seconds", "code" => code)
                .record(start.elapsed().as_secs_f64());
            return Err(if e.is_timeout() {
                AppError::Canceled(format!("check access request timed out: {e}"))
            } else {
                AppError::Transport(format!("error in check access request execution: {e}"))
            });
        }
    };

    let status = response.status();
    let code = status.as_u16().to_string();
    counter!("warden_checkaccess_requests_total", "code" => code.clone()).increment(1);
    histogram!("warden_checkaccess_duration_seconds", "code" => code.clone())
        .record(start.elapsed().as_secs_f64());

    let remaining_quota = response
        .headers()
        .get(REMAINING_QUOTA_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body_bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Transport(format!("error reading check access response: {e}")))?;

    pool.observe(status, remaining_quota.as_deref()).await;

    if !status.is_success() {
        error!(code = status.as_u16(), "check access call failed");
        debug!(
            body = %String::from_utf8_lossy(&body_bytes),
            "check access failure response"
        );
        if status != StatusCode::TOO_MANY_REQUESTS {
            counter!("warden_checkaccess_failure_total", "code" => code).increment(1);
        }
        return Err(AppError::Remote {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body_bytes).into_owned(),
        });
    }

    counter!("warden_checkaccess_success_total").increment(1);
    convert_check_access_response(&body_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MockDecisionStore;
    use crate::config::{AuthzMode, CacheConfig, PolicyConfig, TokenConfig};
    use crate::review::ResourceAttributes;
    use rand::seq::SliceRandom;

    #[derive(Clone, Copy)]
    enum Outcome {
        Allow,
        Deny,
        Error,
    }

    fn result_for(outcome: Outcome, index: usize) -> Result<RemoteVerdict> {
        match outcome {
            Outcome::Allow => Ok(RemoteVerdict {
                allowed: true,
                reason: None,
            }),
            Outcome::Deny => Ok(RemoteVerdict {
                allowed: false,
                reason: Some(format!("denied by worker {index}")),
            }),
            Outcome::Error => Err(AppError::Transport(format!("worker {index} failed"))),
        }
    }

    #[test]
    fn test_aggregation_deny_dominant_under_permutation() {
        let mut rng = rand::thread_rng();
        for denies in 1..4 {
            let mut outcomes = vec![Outcome::Allow; 5];
            outcomes.extend(std::iter::repeat(Outcome::Deny).take(denies));

            for _ in 0..50 {
                outcomes.shuffle(&mut rng);
                let results = outcomes
                    .iter()
                    .enumerate()
                    .map(|(i, o)| result_for(*o, i));
                let verdict = aggregate_verdicts(results).unwrap();
                assert!(!verdict.allowed, "a denial must dominate every permutation");
            }
        }
    }

    #[test]
    fn test_aggregation_all_allowed() {
        let results = (0..4).map(|i| result_for(Outcome::Allow, i));
        assert!(aggregate_verdicts(results).unwrap().allowed);
    }

    #[test]
    fn test_aggregation_error_discards_partial_successes() {
        let mut rng = rand::thread_rng();
        let mut outcomes = vec![Outcome::Allow, Outcome::Deny, Outcome::Error, Outcome::Allow];

        for _ in 0..50 {
            outcomes.shuffle(&mut rng);
            let results = outcomes.iter().enumerate().map(|(i, o)| result_for(*o, i));
            assert!(
                aggregate_verdicts(results).is_err(),
                "an evaluation failure must never yield a decision"
            );
        }
    }

    #[test]
    fn test_aggregation_rejects_empty_input() {
        assert!(matches!(
            aggregate_verdicts(Vec::new()).unwrap_err(),
            AppError::InvalidRequest(_)
        ));
    }

    fn test_engine() -> CheckAccessClient {
        CheckAccessClient::new(&Config {
            mode: AuthzMode::Managed,
            policy: PolicyConfig {
                endpoint: "https://policy.example.com".to_string(),
                resource_id: "clusters/demo".to_string(),
                quota_floor: 2000,
                batch_size: 200,
                remote_timeout_secs: 5,
                skip_principals: vec![],
                allow_discovery_paths: false,
                use_namespace_scope: false,
            },
            token: TokenConfig {
                token_url: "https://login.example.com/token".to_string(),
                client_id: String::new(),
                client_secret: String::new(),
                tenant_id: "tenant-1".to_string(),
                scope: "https://policy.example.com/.default".to_string(),
            },
            cache: CacheConfig::default(),
        })
        .unwrap()
    }

    fn pod_get_spec() -> AccessReviewSpec {
        AccessReviewSpec {
            user: "alice".to_string(),
            resource_attributes: Some(ResourceAttributes {
                verb: "get".to_string(),
                resource: "pods".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_cache_helpers_pass_the_fingerprint_through() {
        let engine = test_engine();
        let spec = pod_get_spec();
        let key = cache::fingerprint(&spec);

        let mut store = MockDecisionStore::new();
        let expected = key.clone();
        store
            .expect_get()
            .withf(move |k| k == expected)
            .return_const(None);
        assert_eq!(engine.cached_decision(&spec, &store), None);

        let mut store = MockDecisionStore::new();
        let expected = key.clone();
        store
            .expect_set()
            .withf(move |k, allowed| k == expected && *allowed)
            .returning(|_, _| Ok(()));
        store.expect_get().return_const(Some(true));
        engine.store_decision(&spec, true, &store).unwrap();
        assert_eq!(engine.cached_decision(&spec, &store), Some(true));
    }

    #[test]
    fn test_check_access_url_shape() {
        let engine = test_engine();
        let url = engine.check_access_url(&pod_get_spec()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://policy.example.com/clusters/demo/providers/AccessPolicy/checkaccess?api-version=2024-02-01"
        );
    }
}
