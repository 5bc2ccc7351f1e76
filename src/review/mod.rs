//! Access-review data model
//!
//! Wire-compatible with the cluster's native access-review protocol: a
//! review spec carries the subject identity plus either resource or
//! non-resource attributes, and a status carries the allow/deny verdict.

use serde::{Deserialize, Serialize};

/// The caller-supplied review request. Never mutated by the engine; all
/// derived structures are copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessReviewSpec {
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_attributes: Option<ResourceAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_resource_attributes: Option<NonResourceAttributes>,
}

/// Attributes of a request against a namespaced or cluster-scoped resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttributes {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default)]
    pub verb: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subresource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Attributes of a request against a non-resource API path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonResourceAttributes {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub verb: String,
}

/// The decision returned to the webhook layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatus {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_error: Option<String>,
}

impl ReviewStatus {
    pub fn allowed(reason: &str) -> Self {
        Self {
            allowed: true,
            denied: None,
            reason: Some(reason.to_string()),
            evaluation_error: None,
        }
    }

    pub fn denied(reason: &str) -> Self {
        Self {
            allowed: false,
            denied: Some(true),
            reason: Some(reason.to_string()),
            evaluation_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_deserializes_native_wire_form() {
        let json = r#"{
            "user": "alice",
            "groups": ["system:authenticated"],
            "resourceAttributes": {
                "namespace": "ns1",
                "verb": "get",
                "resource": "pods"
            }
        }"#;
        let spec: AccessReviewSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.user, "alice");
        let attrs = spec.resource_attributes.unwrap();
        assert_eq!(attrs.namespace, "ns1");
        assert_eq!(attrs.verb, "get");
        assert_eq!(attrs.resource, "pods");
        assert!(attrs.group.is_empty());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ReviewStatus {
            allowed: false,
            denied: Some(true),
            reason: Some("no access".to_string()),
            evaluation_error: Some("backend unavailable".to_string()),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["denied"], true);
        assert_eq!(json["evaluationError"], "backend unavailable");
    }

    #[test]
    fn test_allowed_status_omits_denied() {
        let json = serde_json::to_value(ReviewStatus::allowed("bypass")).unwrap();
        assert!(json.get("denied").is_none());
        assert_eq!(json["reason"], "bypass");
    }
}
