use anyhow::Context;
use async_trait::async_trait;
use pkg_constants::paths::MESH_CONFIG_MAP_KEY;
use pkg_kube::KubeClient;
use pkg_types::mesh::MeshConfiguration;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Durable storage for the mesh configuration.
///
/// Writes must be atomic (publish the whole document or nothing) so the
/// mesh runtime never observes a half-written configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the currently persisted configuration, or `None` if absent.
    async fn load(&self) -> anyhow::Result<Option<MeshConfiguration>>;

    /// Persist the configuration.
    async fn persist(&self, config: &MeshConfiguration) -> anyhow::Result<()>;

    /// Human-readable destination, for logs and the status API.
    fn describe(&self) -> String;
}

/// File-backed store: writes a temp file next to the destination, then
/// renames over it. Rename within one directory is atomic, so readers see
/// either the old or the new document.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> anyhow::Result<Option<MeshConfiguration>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read mesh configuration from {}", self.path.display())
                });
            }
        };
        let config = serde_json::from_slice(&bytes).with_context(|| {
            format!("Invalid mesh configuration in {}", self.path.display())
        })?;
        Ok(Some(config))
    }

    async fn persist(&self, config: &MeshConfiguration) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(config)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to publish {}", self.path.display()))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// ConfigMap-backed store: the configuration lives under the
/// `mesh-config.json` key of a ConfigMap the mesh runtime mounts.
/// The Kubernetes API replaces objects wholesale, so writes are atomic.
pub struct ConfigMapStore {
    kube: Arc<dyn KubeClient>,
    namespace: String,
    name: String,
}

impl ConfigMapStore {
    pub fn new(kube: Arc<dyn KubeClient>, namespace: &str, name: &str) -> Self {
        Self {
            kube,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ConfigStore for ConfigMapStore {
    async fn load(&self) -> anyhow::Result<Option<MeshConfiguration>> {
        let Some(data) = self.kube.get_config_map(&self.namespace, &self.name).await? else {
            return Ok(None);
        };
        let Some(raw) = data.get(MESH_CONFIG_MAP_KEY) else {
            info!(
                "ConfigMap {}/{} exists but has no {} key",
                self.namespace, self.name, MESH_CONFIG_MAP_KEY
            );
            return Ok(None);
        };
        let config = serde_json::from_str(raw).with_context(|| {
            format!("Invalid mesh configuration in ConfigMap {}/{}", self.namespace, self.name)
        })?;
        Ok(Some(config))
    }

    async fn persist(&self, config: &MeshConfiguration) -> anyhow::Result<()> {
        let mut data = BTreeMap::new();
        data.insert(
            MESH_CONFIG_MAP_KEY.to_string(),
            serde_json::to_string_pretty(config)?,
        );
        self.kube
            .put_config_map(&self.namespace, &self.name, data)
            .await
    }

    fn describe(&self) -> String {
        format!("configmap:{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::mesh::MeshSource;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_DIR_SEQ: AtomicU32 = AtomicU32::new(0);

    fn temp_config_path() -> PathBuf {
        let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "meshgate-store-test-{}-{}",
            std::process::id(),
            seq
        ))
        .join("mesh-config.json")
    }

    fn sample_config(endpoint: &str) -> MeshConfiguration {
        let mut config = MeshConfiguration::default();
        config.sources.insert(
            "orders".to_string(),
            MeshSource::Graphql {
                endpoint: endpoint.to_string(),
            },
        );
        config
    }

    #[tokio::test]
    async fn test_load_missing_file_is_none() {
        let store = FileConfigStore::new(temp_config_path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_then_load_round_trip() {
        let path = temp_config_path();
        let store = FileConfigStore::new(&path);

        let config = sample_config("http://orders.shop.svc.cluster.local/graphql");
        store.persist(&config).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, config);

        // Overwrite publishes the new content and leaves no temp file.
        let newer = sample_config("http://orders.shop.svc.cluster.local/gql");
        store.persist(&newer).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap(), newer);

        let dir = path.parent().unwrap();
        let mut entries = tokio::fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name();
            assert!(
                !name.to_string_lossy().ends_with(".tmp"),
                "temp file left behind: {:?}",
                name
            );
        }
    }
}
