//! Network-related constants.

/// Default port for the meshgate gateway server.
pub const DEFAULT_GATEWAY_PORT: u16 = 4000;

/// Default bind host for the gateway server.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default gateway address used by meshgatectl.
pub const DEFAULT_GATEWAY_ADDR: &str = "http://127.0.0.1:4000";

/// Cluster-internal DNS suffix for service addresses.
pub const CLUSTER_DNS_SUFFIX: &str = "svc.cluster.local";

/// Per-request timeout for OpenAPI probe requests, in seconds.
pub const PROBE_TIMEOUT_SECS: u64 = 10;

/// Timeout for Kubernetes API list calls, in seconds.
pub const KUBE_LIST_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every outbound probe request.
pub const PROBE_USER_AGENT: &str = "meshgate-discovery/0.1 (+https://meshgate.io)";
