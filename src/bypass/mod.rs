//! Short-circuit rules evaluated before any cache or network activity

use crate::review::AccessReviewSpec;
use crate::translate::ClusterType;
use std::collections::HashSet;

/// Read-only API prefixes considered safe to expose without a remote check.
pub const DISCOVERY_PATH_PREFIXES: [&str; 4] = ["/api", "/openapi", "/version", "/healthz"];

/// Lowercase the configured skip-set once at construction so lookups are
/// case-insensitive.
pub fn build_skip_set(principals: &[String]) -> HashSet<String> {
    principals.iter().map(|p| p.to_lowercase()).collect()
}

/// Principal bypass applies in connected-cluster mode only.
pub fn skip_principal(
    spec: &AccessReviewSpec,
    cluster_type: ClusterType,
    skip_set: &HashSet<String>,
) -> bool {
    if cluster_type != ClusterType::Connected {
        return false;
    }
    skip_set.contains(&spec.user.to_lowercase())
}

/// Non-resource GETs on discovery-safe paths are allowed unconditionally
/// when the bypass is enabled, independent of cluster type.
pub fn allow_discovery_path(spec: &AccessReviewSpec, enabled: bool) -> bool {
    if !enabled {
        return false;
    }
    let Some(attrs) = &spec.non_resource_attributes else {
        return false;
    };
    if !attrs.verb.eq_ignore_ascii_case("get") {
        return false;
    }
    let path = attrs.path.to_lowercase();
    DISCOVERY_PATH_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}
