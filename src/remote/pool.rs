//! Rate-adaptive connection pool management
//!
//! The remote service load-balances by connection affinity, so a saturated
//! backend replica keeps throttling the same pooled connections. Recycling
//! the client forces subsequent calls onto fresh TCP connections; requests
//! already in flight hold their own handle and are unaffected.

use crate::error::{AppError, Result};
use metrics::counter;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// Remaining-quota response header reported by the remote service.
pub const REMAINING_QUOTA_HEADER: &str = "x-ratelimit-remaining-reads";

pub struct ConnectionPool {
    client: RwLock<Client>,
    timeout: Duration,
    quota_floor: i64,
}

impl ConnectionPool {
    pub fn new(timeout: Duration, quota_floor: i64) -> Result<Self> {
        Ok(Self {
            client: RwLock::new(build_client(timeout)?),
            timeout,
            quota_floor,
        })
    }

    /// Handle on the current client; cheap to clone and keeps serving even
    /// after a recycle swaps the pool underneath.
    pub async fn handle(&self) -> Client {
        self.client.read().await.clone()
    }

    /// Inspect one completed call: throttling recycles immediately, and a
    /// remaining quota below the floor recycles proactively before the
    /// quota is exhausted.
    pub async fn observe(&self, status: StatusCode, remaining_quota: Option<&str>) {
        if status == StatusCode::TOO_MANY_REQUESTS {
            counter!("warden_checkaccess_throttled_total").increment(1);
            self.recycle("throttled").await;
            return;
        }

        if !status.is_success() {
            return;
        }

        let Some(remaining) = remaining_quota else {
            return;
        };
        match remaining.parse::<i64>() {
            Ok(count) if count < self.quota_floor => {
                debug!(
                    remaining = count,
                    floor = self.quota_floor,
                    "remaining quota below floor, recycling idle connections"
                );
                self.recycle("quota").await;
            }
            Ok(_) => {}
            Err(_) => warn!(header = remaining, "unparseable remaining-quota header"),
        }
    }

    async fn recycle(&self, reason: &'static str) {
        match build_client(self.timeout) {
            Ok(fresh) => {
                *self.client.write().await = fresh;
                counter!("warden_pool_recycle_total", "reason" => reason).increment(1);
                debug!(reason, "connection pool recycled");
            }
            // Best-effort action: keep serving on the old pool.
            Err(e) => error!("failed to rebuild HTTP client: {e}"),
        }
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))
}
