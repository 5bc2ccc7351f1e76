//! Configuration management for Warden Core

use anyhow::{bail, Context, Result};
use std::env;
use url::Url;

/// Authorization mode, selecting both the cluster scope shape and the
/// token-acquisition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzMode {
    Managed,
    Fleet,
    Connected,
}

impl AuthzMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode.to_lowercase().as_str() {
            "managed" => Ok(AuthzMode::Managed),
            "fleet" => Ok(AuthzMode::Fleet),
            "connected" => Ok(AuthzMode::Connected),
            other => bail!("unknown authorization mode: {other}"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthzMode::Managed => "managed",
            AuthzMode::Fleet => "fleet",
            AuthzMode::Connected => "connected",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Authorization mode
    pub mode: AuthzMode,
    /// Remote policy service configuration
    pub policy: PolicyConfig,
    /// Token source configuration
    pub token: TokenConfig,
    /// Bundled decision-cache configuration
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Base authorization endpoint URL
    pub endpoint: String,
    /// Cluster resource identifier appended to the endpoint path
    pub resource_id: String,
    /// Remaining-quota floor below which idle connections are recycled
    pub quota_floor: i64,
    /// Maximum actions per check-access request body
    pub batch_size: usize,
    /// Per-call deadline in seconds
    pub remote_timeout_secs: u64,
    /// Principals exempt from authorization checks (connected mode only)
    pub skip_principals: Vec<String>,
    /// Allow unauthenticated GETs on discovery-safe paths
    pub allow_discovery_paths: bool,
    /// Use the namespace-qualified resource scope format
    pub use_namespace_scope: bool,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Token endpoint URL
    pub token_url: String,
    /// Client id for the client-credential grant (connected mode)
    pub client_id: String,
    /// Client secret for the client-credential grant (connected mode)
    pub client_secret: String,
    /// Tenant passed to the delegated token endpoint (managed/fleet modes)
    pub tenant_id: String,
    /// Scope requested from the token source
    pub scope: String,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Capacity of the bundled in-memory decision store
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl Config {
    /// Load configuration from environment variables (a `.env` file is
    /// honored for local development)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mode = AuthzMode::parse(
            &env::var("WARDEN_AUTHZ_MODE").context("WARDEN_AUTHZ_MODE is required")?,
        )?;

        let endpoint =
            env::var("WARDEN_POLICY_ENDPOINT").context("WARDEN_POLICY_ENDPOINT is required")?;
        Url::parse(&endpoint).context("WARDEN_POLICY_ENDPOINT is not a valid URL")?;

        let scope = env::var("WARDEN_TOKEN_SCOPE")
            .unwrap_or_else(|_| format!("{}/.default", endpoint.trim_end_matches('/')));

        Ok(Self {
            mode,
            policy: PolicyConfig {
                endpoint,
                resource_id: env::var("WARDEN_CLUSTER_RESOURCE_ID")
                    .context("WARDEN_CLUSTER_RESOURCE_ID is required")?,
                quota_floor: env::var("WARDEN_QUOTA_FLOOR")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .context("Invalid WARDEN_QUOTA_FLOOR")?,
                batch_size: env::var("WARDEN_BATCH_SIZE")
                    .unwrap_or_else(|_| "200".to_string())
                    .parse()
                    .context("Invalid WARDEN_BATCH_SIZE")?,
                remote_timeout_secs: env::var("WARDEN_REMOTE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid WARDEN_REMOTE_TIMEOUT_SECS")?,
                skip_principals: env::var("WARDEN_SKIP_PRINCIPALS")
                    .map(|s| {
                        s.split(',')
                            .map(|p| p.trim().to_string())
                            .filter(|p| !p.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                allow_discovery_paths: env::var("WARDEN_ALLOW_DISCOVERY_PATHS")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
                use_namespace_scope: env::var("WARDEN_USE_NAMESPACE_SCOPE")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
            },
            token: TokenConfig {
                token_url: env::var("WARDEN_TOKEN_URL").context("WARDEN_TOKEN_URL is required")?,
                client_id: env::var("WARDEN_CLIENT_ID").unwrap_or_default(),
                client_secret: env::var("WARDEN_CLIENT_SECRET").unwrap_or_default(),
                tenant_id: env::var("WARDEN_TENANT_ID").unwrap_or_default(),
                scope,
            },
            cache: CacheConfig {
                capacity: env::var("WARDEN_CACHE_CAPACITY")
                    .unwrap_or_else(|_| "1024".to_string())
                    .parse()
                    .context("Invalid WARDEN_CACHE_CAPACITY")?,
            },
        })
    }
}
