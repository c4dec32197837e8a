/// Kubernetes API client for runner resources
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams};
use kube::{Client, Config, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, warn};

use super::resources::{ResourceKind, ResourceSummary};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a delete call that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The object was already gone
    NotFound,
}

/// The narrow slice of the cluster API a sweep needs
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List every object of `kind` in `namespace`
    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<ResourceSummary>>;

    /// Delete one object of `kind` by name
    async fn delete(&self, kind: ResourceKind, name: &str, namespace: &str)
        -> Result<DeleteOutcome>;
}

/// `ClusterClient` backed by a kube client
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Create a client from a resolved kube configuration
    pub fn new(mut config: Config) -> Result<Self> {
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;

        Ok(Self::from_client(client))
    }

    /// Wrap an already built kube client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn list_of<K>(&self, namespace: &str) -> Result<Vec<ResourceSummary>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .with_context(|| {
                format!(
                    "Failed to list {} in {}",
                    K::plural(&Default::default()),
                    namespace
                )
            })?;

        debug!("Listed {} objects in {}", list.items.len(), namespace);

        Ok(list
            .items
            .iter()
            .filter_map(|object| {
                let summary = ResourceSummary::from_object(object);
                if summary.is_none() {
                    warn!(
                        "Ignoring {} without name or creation timestamp in {}",
                        K::kind(&Default::default()),
                        namespace
                    );
                }
                summary
            })
            .collect())
    }

    async fn delete_of<K>(&self, name: &str, namespace: &str) -> Result<DeleteOutcome>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);

        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(e).with_context(|| {
                format!(
                    "Failed to delete {} {} in {}",
                    K::kind(&Default::default()),
                    name,
                    namespace
                )
            }),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<ResourceSummary>> {
        match kind {
            ResourceKind::Pod => self.list_of::<Pod>(namespace).await,
            ResourceKind::Secret => self.list_of::<Secret>(namespace).await,
            ResourceKind::ConfigMap => self.list_of::<ConfigMap>(namespace).await,
        }
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<DeleteOutcome> {
        match kind {
            ResourceKind::Pod => self.delete_of::<Pod>(name, namespace).await,
            ResourceKind::Secret => self.delete_of::<Secret>(name, namespace).await,
            ResourceKind::ConfigMap => self.delete_of::<ConfigMap>(name, namespace).await,
        }
    }
}
