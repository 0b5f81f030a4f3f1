use crate::openapi::OpenApiDocument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One federation source within the mesh configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MeshSource {
    /// Remote-schema entry: the backend speaks GraphQL natively.
    Graphql { endpoint: String },
    /// Converted REST source: the backend exposes an OpenAPI/Swagger spec.
    Openapi {
        endpoint: String,
        spec_url: String,
        spec: OpenApiDocument,
    },
}

/// The derived federation configuration consumed by the mesh runtime.
///
/// A pure function of one discovery tick's endpoints: recomputed from
/// scratch every tick, keyed by service name, with no accumulation of
/// stale entries. Deliberately carries no timestamps so that structural
/// equality means "nothing changed".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshConfiguration {
    pub sources: BTreeMap<String, MeshSource>,
}

impl MeshConfiguration {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structural_equality_ignores_insertion_order() {
        let mut a = MeshConfiguration::default();
        let mut b = MeshConfiguration::default();

        a.sources.insert(
            "orders".to_string(),
            MeshSource::Graphql {
                endpoint: "http://orders.shop.svc.cluster.local/graphql".to_string(),
            },
        );
        a.sources.insert(
            "users".to_string(),
            MeshSource::Graphql {
                endpoint: "http://users.shop.svc.cluster.local/graphql".to_string(),
            },
        );

        b.sources.insert(
            "users".to_string(),
            MeshSource::Graphql {
                endpoint: "http://users.shop.svc.cluster.local/graphql".to_string(),
            },
        );
        b.sources.insert(
            "orders".to_string(),
            MeshSource::Graphql {
                endpoint: "http://orders.shop.svc.cluster.local/graphql".to_string(),
            },
        );

        assert_eq!(a, b);
    }

    #[test]
    fn test_round_trips_through_json() {
        let spec = crate::openapi::OpenApiDocument::classify(json!({
            "openapi": "3.1.0",
            "info": { "title": "t" },
            "paths": { "/": {} }
        }))
        .unwrap();

        let mut config = MeshConfiguration::default();
        config.sources.insert(
            "t".to_string(),
            MeshSource::Openapi {
                endpoint: "http://t.default.svc.cluster.local:8080".to_string(),
                spec_url: "http://t.default.svc.cluster.local:8080/openapi.json".to_string(),
                spec,
            },
        );

        let bytes = serde_json::to_vec(&config).unwrap();
        let parsed: MeshConfiguration = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(config, parsed);
    }
}
