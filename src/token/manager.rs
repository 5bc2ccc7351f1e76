//! Credential lifecycle with a single-flight refresh protocol

use super::provider::TokenProvider;
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Safety margin subtracted from the source-reported lifetime so a request
/// never carries a token that is already expired at the server.
pub const EXPIRY_DELTA_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Owns the bearer credential and its refresh protocol. Readers take the
/// shared lock; the rare refresh holds the exclusive lock so concurrent
/// callers block on the in-flight refresh instead of issuing duplicates.
pub struct TokenManager {
    provider: Arc<dyn TokenProvider>,
    scope: String,
    credential: RwLock<Option<Credential>>,
}

impl TokenManager {
    pub fn new(provider: Arc<dyn TokenProvider>, scope: String) -> Self {
        Self {
            provider,
            scope,
            credential: RwLock::new(None),
        }
    }

    /// Refresh the credential if its effective expiry has passed.
    ///
    /// Callers that arrive while a refresh is in flight queue on the write
    /// lock and re-check on entry, so an expired credential triggers exactly
    /// one acquisition no matter how many callers observe it.
    pub async fn ensure_fresh(&self) -> Result<()> {
        if !self.is_expired().await {
            return Ok(());
        }

        let mut credential = self.credential.write().await;
        if let Some(current) = credential.as_ref() {
            if current.expires_at > Utc::now() {
                return Ok(());
            }
        }

        match self.provider.acquire(&self.scope).await {
            Ok(grant) => {
                let lifetime = Duration::seconds((grant.expires_in - EXPIRY_DELTA_SECS).max(0));
                let expires_at = Utc::now() + lifetime;
                *credential = Some(Credential {
                    token: grant.token,
                    expires_at,
                });
                counter!("warden_token_refresh_total", "result" => "success").increment(1);
                info!(provider = self.provider.name(), %expires_at, "token refreshed");
                Ok(())
            }
            Err(e) => {
                counter!("warden_token_refresh_total", "result" => "error").increment(1);
                error!(provider = self.provider.name(), "failed to refresh token: {e}");
                Err(AppError::Authentication(format!(
                    "{} failed to refresh token: {e}",
                    self.provider.name()
                )))
            }
        }
    }

    /// Read-only diagnostic query; a manager holding no credential reports
    /// expired so the first call always refreshes.
    pub async fn is_expired(&self) -> bool {
        match self.credential.read().await.as_ref() {
            Some(credential) => credential.expires_at <= Utc::now(),
            None => true,
        }
    }

    /// Authorization header map attached to every dispatched call.
    pub async fn bearer_headers(&self) -> Result<HeaderMap> {
        let credential = self.credential.read().await;
        let Some(current) = credential.as_ref() else {
            return Err(AppError::Authentication(
                "no credential held, call ensure_fresh first".to_string(),
            ));
        };

        let value = HeaderValue::from_str(&format!("Bearer {}", current.token))
            .map_err(|e| AppError::Authentication(format!("invalid bearer token: {e}")))?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}
