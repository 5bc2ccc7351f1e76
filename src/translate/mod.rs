//! Translation of an access-review spec into remote check-access bodies

use crate::config::AuthzMode;
use crate::error::{AppError, Result};
use crate::remote::types::{ActionInfo, CheckAccessRequest, ResourceInfo, SubjectInfo};
use crate::review::{AccessReviewSpec, NonResourceAttributes, ResourceAttributes};

/// Deployment-mode tag selecting the resource-scope path shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterType {
    Managed,
    Fleet,
    Connected,
}

impl ClusterType {
    pub fn scope_prefix(&self) -> &'static str {
        match self {
            ClusterType::Managed => "ContainerService/managedClusters",
            ClusterType::Fleet => "ContainerService/fleets",
            ClusterType::Connected => "Kubernetes/connectedClusters",
        }
    }
}

impl From<AuthzMode> for ClusterType {
    fn from(mode: AuthzMode) -> Self {
        match mode {
            AuthzMode::Managed => ClusterType::Managed,
            AuthzMode::Fleet => ClusterType::Fleet,
            AuthzMode::Connected => ClusterType::Connected,
        }
    }
}

/// Group segment used for resources in the core API group.
const CORE_API_GROUP: &str = "core";

fn accesses_for_verb(verb: &str) -> Vec<String> {
    match verb {
        "get" | "list" | "watch" => vec!["read".to_string()],
        "create" | "update" | "patch" => vec!["write".to_string()],
        "delete" | "deletecollection" => vec!["delete".to_string()],
        "*" => vec![
            "read".to_string(),
            "write".to_string(),
            "delete".to_string(),
        ],
        other => vec![other.to_string()],
    }
}

/// Namespace scope segment, present only when the spec carries a namespace
/// and the namespace-qualified scope format is enabled.
pub fn namespace_scope(spec: &AccessReviewSpec, use_namespace_scope: bool) -> Option<String> {
    if !use_namespace_scope {
        return None;
    }
    let attrs = spec.resource_attributes.as_ref()?;
    if attrs.namespace.is_empty() {
        return None;
    }
    Some(format!("namespaces/{}", attrs.namespace))
}

fn resource_actions(attrs: &ResourceAttributes, cluster_type: ClusterType) -> Result<Vec<ActionInfo>> {
    if attrs.resource.is_empty() {
        return Err(AppError::InvalidRequest(
            "resource attributes carry no resource".to_string(),
        ));
    }
    if attrs.verb.is_empty() {
        return Err(AppError::InvalidRequest(
            "resource attributes carry no verb".to_string(),
        ));
    }

    let group = if attrs.group.is_empty() {
        CORE_API_GROUP
    } else {
        attrs.group.as_str()
    };
    let mut base = format!("{}/{}/{}", cluster_type.scope_prefix(), group, attrs.resource);
    if !attrs.subresource.is_empty() {
        base = format!("{}/{}", base, attrs.subresource);
    }

    Ok(accesses_for_verb(&attrs.verb)
        .into_iter()
        .map(|access| ActionInfo {
            id: format!("{base}/{access}"),
        })
        .collect())
}

fn non_resource_actions(
    attrs: &NonResourceAttributes,
    cluster_type: ClusterType,
) -> Result<Vec<ActionInfo>> {
    if attrs.path.is_empty() {
        return Err(AppError::InvalidRequest(
            "non-resource attributes carry no path".to_string(),
        ));
    }
    if attrs.verb.is_empty() {
        return Err(AppError::InvalidRequest(
            "non-resource attributes carry no verb".to_string(),
        ));
    }

    // The path already starts with '/', so it concatenates directly onto
    // the cluster scope prefix.
    Ok(accesses_for_verb(&attrs.verb)
        .into_iter()
        .map(|access| ActionInfo {
            id: format!("{}{}/{}", cluster_type.scope_prefix(), attrs.path, access),
        })
        .collect())
}

/// Map one review spec to the remote request bodies it implies.
///
/// Actions are chunked at `batch_size`, so a spec expanding to more actions
/// than one body holds produces several bodies evaluated concurrently.
pub fn prepare_check_access_requests(
    spec: &AccessReviewSpec,
    cluster_type: ClusterType,
    resource_id: &str,
    use_namespace_scope: bool,
    batch_size: usize,
) -> Result<Vec<CheckAccessRequest>> {
    if spec.user.is_empty() {
        return Err(AppError::InvalidRequest(
            "subject identity is empty".to_string(),
        ));
    }

    let (actions, resource) = match (&spec.resource_attributes, &spec.non_resource_attributes) {
        (Some(attrs), _) => {
            let scope = match namespace_scope(spec, use_namespace_scope) {
                Some(ns) => format!("{}/{}", resource_id.trim_end_matches('/'), ns),
                None => resource_id.to_string(),
            };
            (
                resource_actions(attrs, cluster_type)?,
                Some(ResourceInfo { id: scope }),
            )
        }
        (None, Some(attrs)) => (non_resource_actions(attrs, cluster_type)?, None),
        (None, None) => {
            return Err(AppError::InvalidRequest(
                "neither resource nor non-resource attributes are present".to_string(),
            ))
        }
    };

    if actions.is_empty() {
        return Err(AppError::InvalidRequest(
            "spec produced no check access actions".to_string(),
        ));
    }

    let subject = SubjectInfo {
        principal_id: spec.user.clone(),
        groups: spec.groups.clone(),
    };

    Ok(actions
        .chunks(batch_size.max(1))
        .map(|chunk| CheckAccessRequest {
            subject: subject.clone(),
            actions: chunk.to_vec(),
            resource: resource.clone(),
        })
        .collect())
}
