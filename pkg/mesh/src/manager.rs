use crate::store::ConfigStore;
use chrono::{DateTime, Utc};
use pkg_types::endpoint::ServiceEndpoint;
use pkg_types::mesh::{MeshConfiguration, MeshSource};
use pkg_types::status::{MeshHealth, MeshStats};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Converts each probed service list into a federation configuration and
/// persists it only when it differs from the last applied one.
pub struct MeshManager {
    store: Arc<dyn ConfigStore>,
    state: Mutex<ManagerState>,
}

#[derive(Default)]
struct ManagerState {
    last_applied: Option<MeshConfiguration>,
    last_updated: Option<DateTime<Utc>>,
    closed: bool,
}

impl MeshManager {
    /// Create a manager, seeding the last-applied configuration from the
    /// store so a restart against an unchanged cluster performs no
    /// redundant write. A failed load degrades to an empty baseline.
    pub async fn new(store: Arc<dyn ConfigStore>) -> Self {
        let last_applied = match store.load().await {
            Ok(Some(config)) => {
                info!(
                    "Loaded existing mesh configuration from {} ({} sources)",
                    store.describe(),
                    config.sources.len()
                );
                Some(config)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "Failed to load mesh configuration from {}: {}",
                    store.describe(),
                    e
                );
                None
            }
        };

        Self {
            store,
            state: Mutex::new(ManagerState {
                last_applied,
                ..Default::default()
            }),
        }
    }

    /// Derive the configuration for one tick's endpoints.
    ///
    /// Natively GraphQL-capable services become remote-schema entries;
    /// services with a probed spec become converted REST sources. The map
    /// is keyed by service name, so a name listed twice resolves to the
    /// later entry.
    pub fn build_configuration(services: &[ServiceEndpoint]) -> MeshConfiguration {
        let mut config = MeshConfiguration::default();
        for service in services {
            if let Some(path) = service.graphql_path() {
                config.sources.insert(
                    service.name.clone(),
                    MeshSource::Graphql {
                        endpoint: join_path(&service.internal_url, path),
                    },
                );
            } else if service.has_openapi {
                let Some(spec) = service.openapi_spec.clone() else {
                    continue;
                };
                let spec_path = service.openapi_url.as_deref().unwrap_or_default();
                config.sources.insert(
                    service.name.clone(),
                    MeshSource::Openapi {
                        endpoint: service.internal_url.clone(),
                        spec_url: join_path(&service.internal_url, spec_path),
                        spec,
                    },
                );
            }
        }
        config
    }

    /// Recompute the configuration and persist it if it changed.
    /// Returns `true` iff a write happened. Store failures propagate —
    /// they are not an "unchanged" outcome.
    pub async fn update_configuration(
        &self,
        services: &[ServiceEndpoint],
    ) -> anyhow::Result<bool> {
        let config = Self::build_configuration(services);

        {
            let state = self.state.lock().unwrap();
            if state.last_applied.as_ref() == Some(&config) {
                debug!(
                    "Mesh configuration unchanged ({} sources), skipping write",
                    config.sources.len()
                );
                return Ok(false);
            }
        }

        self.store.persist(&config).await?;
        info!(
            "Mesh configuration updated: {} sources -> {}",
            config.sources.len(),
            self.store.describe()
        );

        let mut state = self.state.lock().unwrap();
        state.last_applied = Some(config);
        state.last_updated = Some(Utc::now());
        Ok(true)
    }

    /// The configuration as last applied, if any.
    pub fn current_config(&self) -> Option<MeshConfiguration> {
        self.state.lock().unwrap().last_applied.clone()
    }

    pub fn stats(&self) -> MeshStats {
        let state = self.state.lock().unwrap();
        let service_names = state
            .last_applied
            .as_ref()
            .map(MeshConfiguration::service_names)
            .unwrap_or_default();
        MeshStats {
            service_count: service_names.len(),
            service_names,
            has_config: state.last_applied.is_some(),
            last_updated: state.last_updated,
        }
    }

    pub fn health_status(&self) -> MeshHealth {
        let state = self.state.lock().unwrap();
        let count = state
            .last_applied
            .as_ref()
            .map(|c| c.sources.len())
            .unwrap_or(0);
        MeshHealth {
            healthy: state.last_applied.is_some() && !state.closed,
            has_config: state.last_applied.is_some(),
            service_count: count,
        }
    }

    /// Release held resources on loop shutdown. Safe to call on a manager
    /// that never ran, and safe to call more than once.
    pub fn cleanup(&self) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.closed = true;
        info!("Mesh manager cleaned up");
    }

    pub fn store_description(&self) -> String {
        self.store.describe()
    }
}

/// Join a base URL and a path, tolerating a missing leading slash.
fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
