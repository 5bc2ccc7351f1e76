//! Token-source collaborators
//!
//! A token source hands out an opaque bearer credential with a lifetime;
//! everything else about acquisition is its own business.

use crate::config::TokenConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 30;

/// A grant returned by a token source.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub token: String,
    /// Source-reported lifetime in seconds.
    pub expires_in: i64,
}

/// Opaque token source consulted by the token manager.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire(&self, scope: &str) -> Result<TokenGrant>;
    fn name(&self) -> &'static str;
}

fn token_http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Authentication(format!("failed to build token client: {e}")))
}

/// OAuth2-style client-credential grant against the token endpoint.
pub struct ClientCredentialProvider {
    http_client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentialProvider {
    pub fn new(config: &TokenConfig) -> Result<Self> {
        Ok(Self {
            http_client: token_http_client()?,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialProvider {
    async fn acquire(&self, scope: &str) -> Result<TokenGrant> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|e| AppError::Authentication(format!("failed to reach token endpoint: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Authentication(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AppError::Authentication(format!("failed to parse token response: {e}"))
        })?;

        Ok(TokenGrant {
            token: token_response.access_token,
            expires_in: token_response.expires_in,
        })
    }

    fn name(&self) -> &'static str {
        "client-credential"
    }
}

/// Delegated token endpoint used by managed and fleet clusters: the
/// endpoint performs the credential exchange on the cluster's behalf.
pub struct DelegatedTokenProvider {
    http_client: Client,
    token_url: String,
    tenant_id: String,
}

impl DelegatedTokenProvider {
    pub fn new(config: &TokenConfig) -> Result<Self> {
        Ok(Self {
            http_client: token_http_client()?,
            token_url: config.token_url.clone(),
            tenant_id: config.tenant_id.clone(),
        })
    }
}

#[async_trait]
impl TokenProvider for DelegatedTokenProvider {
    async fn acquire(&self, scope: &str) -> Result<TokenGrant> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct DelegatedTokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let response = self
            .http_client
            .post(&self.token_url)
            .json(&serde_json::json!({
                "tenantId": self.tenant_id,
                "scope": scope,
            }))
            .send()
            .await
            .map_err(|e| AppError::Authentication(format!("failed to reach token endpoint: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Authentication(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token_response: DelegatedTokenResponse = response.json().await.map_err(|e| {
            AppError::Authentication(format!("failed to parse token response: {e}"))
        })?;

        Ok(TokenGrant {
            token: token_response.access_token,
            expires_in: token_response.expires_in,
        })
    }

    fn name(&self) -> &'static str {
        "delegated"
    }
}
