//! Bearer-token lifecycle: opaque token sources and the refresh protocol

mod manager;
mod provider;

pub use manager::{TokenManager, EXPIRY_DELTA_SECS};
pub use provider::{ClientCredentialProvider, DelegatedTokenProvider, TokenGrant, TokenProvider};

use crate::config::{AuthzMode, TokenConfig};
use crate::error::Result;
use std::sync::Arc;

/// Select the token source for the configured authorization mode:
/// connected clusters authenticate with their own client credential, while
/// managed and fleet clusters go through the delegated token endpoint.
pub fn provider_for(mode: AuthzMode, config: &TokenConfig) -> Result<Arc<dyn TokenProvider>> {
    match mode {
        AuthzMode::Connected => Ok(Arc::new(ClientCredentialProvider::new(config)?)),
        AuthzMode::Managed | AuthzMode::Fleet => {
            Ok(Arc::new(DelegatedTokenProvider::new(config)?))
        }
    }
}
