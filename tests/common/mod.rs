//! Common test utilities

use serde_json::json;
use warden_core::config::{AuthzMode, CacheConfig, Config, PolicyConfig, TokenConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Engine configuration pointed at a MockServer.
pub fn test_config(mode: AuthzMode, base_url: &str) -> Config {
    Config {
        mode,
        policy: PolicyConfig {
            endpoint: base_url.to_string(),
            resource_id: "clusters/demo".to_string(),
            quota_floor: 2000,
            batch_size: 200,
            remote_timeout_secs: 5,
            skip_principals: vec![],
            allow_discovery_paths: false,
            use_namespace_scope: false,
        },
        token: TokenConfig {
            token_url: format!("{base_url}/token"),
            client_id: "warden".to_string(),
            client_secret: "test-secret".to_string(),
            tenant_id: "tenant-1".to_string(),
            scope: format!("{base_url}/.default"),
        },
        cache: CacheConfig::default(),
    }
}

/// Mount the delegated token endpoint used by managed/fleet mode engines.
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "mock-token",
            "expiresIn": 3600
        })))
        .mount(server)
        .await;
}
