//! Service discovery constants.

/// Candidate paths probed for an OpenAPI/Swagger document, in order.
/// A per-service annotation override (see [`ANNOTATION_OPENAPI_PATH`]) is
/// always tried before this list.
pub const OPENAPI_PROBE_PATHS: [&str; 12] = [
    "/openapi.json",
    "/openapi",
    "/swagger.json",
    "/swagger",
    "/api/openapi.json",
    "/api/swagger.json",
    "/api/v1/openapi.json",
    "/v1/openapi.json",
    "/docs/openapi.json",
    "/.well-known/openapi.json",
    "/spec.json",
    "/api-docs",
];

/// Annotation that overrides the probe path list for a service.
pub const ANNOTATION_OPENAPI_PATH: &str = "discovery.meshgate.io/openapi-path";

/// Annotation that marks a service as natively GraphQL-capable.
/// The value is the path of its GraphQL endpoint (e.g. `/graphql`).
pub const ANNOTATION_GRAPHQL_PATH: &str = "discovery.meshgate.io/graphql-path";

/// Default label selector for discoverable services.
pub const DEFAULT_SERVICE_SELECTOR: &str = "app.kubernetes.io/managed-by=kubevela";

/// Default discovery interval.
pub const DEFAULT_INTERVAL: &str = "5m";

/// Default delay before the first retry after a failed tick.
pub const DEFAULT_RETRY_DELAY: &str = "30s";

/// Default number of exponential-backoff retries before the loop
/// gives up and resumes the regular cadence.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
