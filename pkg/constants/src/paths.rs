//! Filesystem path constants.

// ─── Server ────────────────────────────────────────────────────────────────

/// Default config file path for the gateway server.
pub const DEFAULT_SERVER_CONFIG: &str = "/etc/meshgate/config.yaml";

/// Default destination for the persisted mesh configuration.
pub const DEFAULT_MESH_CONFIG_PATH: &str = "/etc/meshgate/mesh-config.json";

/// Key under which the mesh configuration is stored in a ConfigMap.
pub const MESH_CONFIG_MAP_KEY: &str = "mesh-config.json";

// ─── In-cluster service account ───────────────────────────────────────────

/// Mounted service-account bearer token.
pub const SERVICE_ACCOUNT_TOKEN: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Mounted namespace of the running pod.
pub const SERVICE_ACCOUNT_NAMESPACE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";
