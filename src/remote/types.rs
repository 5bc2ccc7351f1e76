//! Wire types for the remote check-access protocol

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Subject of a check-access call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInfo {
    pub principal_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// One action being evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInfo {
    pub id: String,
}

/// Scope the actions are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub id: String,
}

/// One remote check-access request body. Immutable once built; non-resource
/// requests carry no resource scope (the reduced form).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAccessRequest {
    pub subject: SubjectInfo,
    pub actions: Vec<ActionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
}

/// Per-action verdict in the remote response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDecision {
    pub action_id: String,
    pub access_decision: String,
}

/// Verdict of one completed check-access call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

const ACCESS_DECISION_ALLOWED: &str = "allowed";

/// Convert a raw response body into a verdict: the call is allowed only if
/// every evaluated action is allowed.
pub fn convert_check_access_response(body: &[u8]) -> Result<RemoteVerdict> {
    let decisions: Vec<ActionDecision> = serde_json::from_slice(body)
        .map_err(|e| AppError::Transport(format!("error decoding check access response: {e}")))?;

    if decisions.is_empty() {
        return Err(AppError::Transport(
            "check access response carried no decisions".to_string(),
        ));
    }

    match decisions
        .iter()
        .find(|d| !d.access_decision.eq_ignore_ascii_case(ACCESS_DECISION_ALLOWED))
    {
        Some(denied) => Ok(RemoteVerdict {
            allowed: false,
            reason: Some(format!("access denied for action {}", denied.action_id)),
        }),
        None => Ok(RemoteVerdict {
            allowed: true,
            reason: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_wire_form() {
        let request = CheckAccessRequest {
            subject: SubjectInfo {
                principal_id: "alice".to_string(),
                groups: vec!["dev".to_string()],
            },
            actions: vec![ActionInfo {
                id: "ContainerService/managedClusters/core/pods/read".to_string(),
            }],
            resource: Some(ResourceInfo {
                id: "clusters/demo".to_string(),
            }),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["subject"]["principalId"], "alice");
        assert_eq!(
            value["actions"][0]["id"],
            "ContainerService/managedClusters/core/pods/read"
        );
        assert_eq!(value["resource"]["id"], "clusters/demo");
    }

    #[test]
    fn test_reduced_form_omits_resource() {
        let request = CheckAccessRequest {
            subject: SubjectInfo {
                principal_id: "alice".to_string(),
                groups: vec![],
            },
            actions: vec![ActionInfo {
                id: "Kubernetes/connectedClusters/api/read".to_string(),
            }],
            resource: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("resource").is_none());
        assert!(value["subject"].get("groups").is_none());
    }

    #[test]
    fn test_convert_all_allowed() {
        let body = serde_json::to_vec(&json!([
            {"actionId": "a/read", "accessDecision": "Allowed"},
            {"actionId": "a/write", "accessDecision": "allowed"}
        ]))
        .unwrap();

        let verdict = convert_check_access_response(&body).unwrap();
        assert!(verdict.allowed);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_convert_any_denied() {
        let body = serde_json::to_vec(&json!([
            {"actionId": "a/read", "accessDecision": "Allowed"},
            {"actionId": "a/delete", "accessDecision": "NotAllowed"}
        ]))
        .unwrap();

        let verdict = convert_check_access_response(&body).unwrap();
        assert!(!verdict.allowed);
        assert!(verdict.reason.unwrap().contains("a/delete"));
    }

    #[test]
    fn test_convert_rejects_empty_response() {
        let err = convert_check_access_response(b"[]").unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[test]
    fn test_convert_rejects_malformed_body() {
        let err = convert_check_access_response(b"not json").unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }
}
