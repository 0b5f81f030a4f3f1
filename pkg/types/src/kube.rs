use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Generic Kubernetes list envelope (`ServiceList`, Knative `ServiceList`, …).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct KubeList<T> {
    #[serde(default)]
    pub items: Vec<T>,
}

/// The subset of `metadata` the discovery pipeline consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

// ─── Plain services ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeService {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: KubeServiceSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubeServiceSpec {
    #[serde(default)]
    pub ports: Vec<KubeServicePort>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeServicePort {
    #[serde(default)]
    pub name: Option<String>,
    pub port: u16,
}

// ─── Knative services ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnativeService {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: KnativeServiceStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnativeServiceStatus {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub conditions: Vec<KnativeCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnativeCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
}

impl KnativeServiceStatus {
    /// True iff a `Ready` condition with status `True` is present.
    pub fn is_ready(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.condition_type == "Ready" && c.status == "True")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knative_readiness() {
        let mut status = KnativeServiceStatus::default();
        assert!(!status.is_ready());

        status.conditions.push(KnativeCondition {
            condition_type: "ConfigurationsReady".to_string(),
            status: "True".to_string(),
        });
        assert!(!status.is_ready());

        status.conditions.push(KnativeCondition {
            condition_type: "Ready".to_string(),
            status: "Unknown".to_string(),
        });
        assert!(!status.is_ready());

        status.conditions.push(KnativeCondition {
            condition_type: "Ready".to_string(),
            status: "True".to_string(),
        });
        assert!(status.is_ready());
    }

    #[test]
    fn test_service_list_deserializes_sparse_json() {
        let raw = r#"{
            "items": [
                {
                    "metadata": { "name": "orders", "namespace": "shop" },
                    "spec": { "ports": [ { "name": "http", "port": 8080 } ] }
                },
                { "metadata": { "name": "bare" } }
            ]
        }"#;
        let list: KubeList<KubeService> = serde_json::from_str(raw).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].spec.ports[0].port, 8080);
        assert!(list.items[1].spec.ports.is_empty());
    }
}
