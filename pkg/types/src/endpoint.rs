use crate::openapi::OpenApiDocument;
use pkg_constants::discovery::{ANNOTATION_GRAPHQL_PATH, ANNOTATION_OPENAPI_PATH};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One discovered backend service.
///
/// Endpoints are recreated from scratch on every discovery tick; they carry
/// no identity beyond the tick that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub namespace: String,
    /// Externally reachable address. Empty for services without one
    /// (plain Services, unready Knative revisions).
    #[serde(default)]
    pub url: String,
    /// Cluster-internal address used for probing.
    pub internal_url: String,
    pub ready: bool,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub has_openapi: bool,
    #[serde(default)]
    pub openapi_spec: Option<OpenApiDocument>,
    /// The path at which the spec was found, if any.
    #[serde(default)]
    pub openapi_url: Option<String>,
    /// Last probe error, only set when every candidate path failed at the
    /// transport layer.
    #[serde(default)]
    pub error: Option<String>,
}

impl ServiceEndpoint {
    /// Per-service probe path override, declared via annotation.
    pub fn openapi_path_override(&self) -> Option<&str> {
        self.annotations
            .get(ANNOTATION_OPENAPI_PATH)
            .map(String::as_str)
    }

    /// GraphQL endpoint path for natively GraphQL-capable services.
    pub fn graphql_path(&self) -> Option<&str> {
        self.annotations
            .get(ANNOTATION_GRAPHQL_PATH)
            .map(String::as_str)
    }
}
