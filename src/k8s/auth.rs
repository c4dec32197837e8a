/// Cluster credential resolution
///
/// Credential sources are tried in order and the first one that yields a
/// client wins. The in-cluster service account is preferred; a kubeconfig
/// (explicit file or the usual discovery) is the fallback.
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::client::{ClusterClient, KubeClusterClient};
use crate::config::Settings;
use crate::error::{AuthError, StrategyFailure};

/// Namespace file mounted next to the service account token
pub const SERVICE_ACCOUNT_NAMESPACE_FILE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// An authenticated client and the namespace its credentials point at
pub struct ClusterSession {
    pub client: Arc<dyn ClusterClient>,
    pub default_namespace: String,
    pub source: String,
}

/// One way of obtaining cluster credentials
#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Try to build a session from this credential source
    async fn try_load(&self) -> Result<ClusterSession>;
}

/// Service account credentials mounted into the running pod
#[derive(Default)]
pub struct InClusterStrategy;

#[async_trait]
impl CredentialStrategy for InClusterStrategy {
    fn name(&self) -> &str {
        "in-cluster"
    }

    async fn try_load(&self) -> Result<ClusterSession> {
        let config = Config::incluster().context("In-cluster service account not available")?;
        let default_namespace = fallback_namespace(
            Path::new(SERVICE_ACCOUNT_NAMESPACE_FILE),
            &config.default_namespace,
        );
        let client = KubeClusterClient::new(config)?;

        Ok(ClusterSession {
            client: Arc::new(client),
            default_namespace,
            source: self.name().to_string(),
        })
    }
}

/// Local kubeconfig credentials, optionally from an explicit file and context
pub struct KubeconfigStrategy {
    path: Option<PathBuf>,
    context: Option<String>,
}

impl KubeconfigStrategy {
    pub fn new(path: Option<PathBuf>, context: Option<String>) -> Self {
        Self { path, context }
    }

    async fn load_config(&self) -> Result<Config> {
        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..Default::default()
        };

        match &self.path {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("Failed to load kubeconfig")
            }
            None => Config::from_kubeconfig(&options)
                .await
                .context("Failed to load kubeconfig"),
        }
    }
}

#[async_trait]
impl CredentialStrategy for KubeconfigStrategy {
    fn name(&self) -> &str {
        "kubeconfig"
    }

    async fn try_load(&self) -> Result<ClusterSession> {
        let config = self.load_config().await?;
        let default_namespace = fallback_namespace(
            Path::new(SERVICE_ACCOUNT_NAMESPACE_FILE),
            &config.default_namespace,
        );
        let client = KubeClusterClient::new(config)?;

        let source = match &self.context {
            Some(context) => format!("{} (context {})", self.name(), context),
            None => self.name().to_string(),
        };

        Ok(ClusterSession {
            client: Arc::new(client),
            default_namespace,
            source,
        })
    }
}

/// Ordered list of credential strategies
pub struct AuthResolver {
    strategies: Vec<Box<dyn CredentialStrategy>>,
}

impl AuthResolver {
    pub fn new(strategies: Vec<Box<dyn CredentialStrategy>>) -> Self {
        Self { strategies }
    }

    /// In-cluster first, then the kubeconfig selected by the settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(vec![
            Box::new(InClusterStrategy),
            Box::new(KubeconfigStrategy::new(
                settings.kubeconfig.clone(),
                settings.auth_context.clone(),
            )),
        ])
    }

    /// Return the first session any strategy produces
    pub async fn resolve(&self) -> Result<ClusterSession, AuthError> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            match strategy.try_load().await {
                Ok(session) => {
                    info!(
                        source = %session.source,
                        namespace = %session.default_namespace,
                        "Authenticated to cluster"
                    );
                    return Ok(session);
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), "Credential source unavailable: {:#}", e);
                    failures.push(StrategyFailure {
                        strategy: strategy.name().to_string(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        Err(AuthError { failures })
    }
}

/// Mounted namespace file if readable, otherwise the credential's namespace
fn fallback_namespace(namespace_file: &Path, configured: &str) -> String {
    match read_namespace_file(namespace_file) {
        Some(namespace) => {
            debug!("Using namespace {} from {}", namespace, namespace_file.display());
            namespace
        }
        None if configured.is_empty() => "default".to_string(),
        None => configured.to_string(),
    }
}

fn read_namespace_file(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let namespace = content.trim();
    if namespace.is_empty() {
        None
    } else {
        Some(namespace.to_string())
    }
}
