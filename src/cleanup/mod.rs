/// Sweep of stale runner resources
///
/// A sweep walks the enabled kinds in order, lists each one, and deletes every
/// item the selection rule picks. Any listing or deletion failure aborts the
/// sweep, and the whole sweep is retried from the first kind.
use chrono::Utc;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::{CleanupError, ClusterError};
use crate::k8s::resources::select;
use crate::k8s::{ClusterClient, DeleteOutcome, ResourceKind};
use crate::utils::retry::RetryPolicy;

/// What one kind's pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindReport {
    pub kind: ResourceKind,
    pub listed: usize,
    pub deleted: usize,
    pub already_gone: usize,
}

/// Counts from one complete sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub kinds: Vec<KindReport>,
}

impl SweepReport {
    pub fn deleted(&self) -> usize {
        self.kinds.iter().map(|k| k.deleted).sum()
    }

    pub fn already_gone(&self) -> usize {
        self.kinds.iter().map(|k| k.already_gone).sum()
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// 1-based number of the attempt that completed
    pub attempts: u32,
    pub sweep: SweepReport,
}

/// Drives sweeps of one namespace through a cluster client
pub struct Sweeper<'a> {
    config: &'a RunConfig,
    client: &'a dyn ClusterClient,
}

impl<'a> Sweeper<'a> {
    /// Create a new sweeper
    pub fn new(config: &'a RunConfig, client: &'a dyn ClusterClient) -> Self {
        Self { config, client }
    }

    /// Run sweeps until one completes or the retry budget is spent
    pub async fn run(&self) -> Result<CleanupReport, CleanupError> {
        let policy = RetryPolicy::new(
            self.config.max_retries,
            format!("Sweep of namespace {}", self.config.namespace),
        );

        match policy.run(|attempt| self.sweep(attempt)).await {
            Ok(done) => Ok(CleanupReport {
                attempts: done.attempt,
                sweep: done.value,
            }),
            Err(exhausted) => Err(CleanupError::SweepExhausted {
                attempts: exhausted.attempts,
                last_error: exhausted.last_error,
            }),
        }
    }

    /// One pass over every enabled kind; stops at the first failure
    pub async fn sweep(&self, attempt: u32) -> Result<SweepReport, ClusterError> {
        debug!(attempt, "Starting sweep");

        let mut report = SweepReport::default();

        for kind in ResourceKind::ALL {
            if !self.config.is_enabled(kind) {
                info!(kind = %kind, "Skipping {}s", kind);
                continue;
            }

            report.kinds.push(self.sweep_kind(kind).await?);
        }

        Ok(report)
    }

    async fn sweep_kind(&self, kind: ResourceKind) -> Result<KindReport, ClusterError> {
        let namespace = &self.config.namespace;

        info!(
            kind = %kind,
            namespace = %namespace,
            "Deleting {}s older than {} hours",
            kind,
            self.config.age_threshold_hours
        );

        let items = self
            .client
            .list(kind, namespace)
            .await
            .map_err(|cause| ClusterError::List {
                kind,
                namespace: namespace.clone(),
                cause,
            })?;

        let now = Utc::now();
        let due = select(
            &items,
            &self.config.name_prefix,
            self.config.age_threshold_hours,
            now,
        );

        let mut report = KindReport {
            kind,
            listed: items.len(),
            deleted: 0,
            already_gone: 0,
        };

        for item in due {
            let age_hours = item.age_hours(now);

            info!(
                kind = %kind,
                name = %item.name,
                created = %item.creation_timestamp,
                age_hours,
                "{} {} is {:.2} hours old, deleting",
                kind,
                item.name,
                age_hours
            );

            let outcome = self
                .client
                .delete(kind, &item.name, namespace)
                .await
                .map_err(|cause| ClusterError::Delete {
                    kind,
                    name: item.name.clone(),
                    namespace: namespace.clone(),
                    cause,
                })?;

            match outcome {
                DeleteOutcome::Deleted => report.deleted += 1,
                DeleteOutcome::NotFound => {
                    info!(kind = %kind, name = %item.name, "{} {} already deleted", kind, item.name);
                    report.already_gone += 1;
                }
            }
        }

        info!(
            kind = %kind,
            deleted = report.deleted,
            already_gone = report.already_gone,
            "Done deleting {}s",
            kind
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::testing::{Call, FakeCluster};
    use crate::k8s::resources::ResourceSummary;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn run_config(kinds: &[ResourceKind], max_retries: u32) -> RunConfig {
        RunConfig {
            namespace: "ci".to_string(),
            age_threshold_hours: 1.5,
            max_retries,
            auth_context: None,
            name_prefix: "runner-".to_string(),
            enabled_kinds: kinds.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn hours_old(name: &str, hours: i64) -> ResourceSummary {
        ResourceSummary::new(name, Utc::now() - Duration::hours(hours))
    }

    fn populated_cluster() -> FakeCluster {
        let cluster = FakeCluster::new();
        for kind in ResourceKind::ALL {
            cluster.insert(kind, hours_old(&format!("runner-old-{}", kind), 3));
            cluster.insert(kind, hours_old(&format!("runner-new-{}", kind), 0));
            cluster.insert(kind, hours_old(&format!("keep-{}", kind), 5));
        }
        cluster.insert(ResourceKind::Secret, hours_old("runner-old-secret-2", 4));
        cluster
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_qualifying_items() {
        let cluster = populated_cluster();
        let config = run_config(&ResourceKind::ALL, 3);

        let report = Sweeper::new(&config, &cluster).run().await.unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(report.sweep.deleted(), 4);
        assert_eq!(
            cluster.names(ResourceKind::Pod),
            vec!["runner-new-pod", "keep-pod"]
        );
        assert_eq!(
            cluster.names(ResourceKind::Secret),
            vec!["runner-new-secret", "keep-secret"]
        );
        assert_eq!(
            cluster.names(ResourceKind::ConfigMap),
            vec!["runner-new-configmap", "keep-configmap"]
        );
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let cluster = populated_cluster();
        let config = run_config(&ResourceKind::ALL, 3);

        Sweeper::new(&config, &cluster).run().await.unwrap();
        let deletes_after_first = cluster.delete_calls();

        let report = Sweeper::new(&config, &cluster).run().await.unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(report.sweep.deleted(), 0);
        assert_eq!(report.sweep.already_gone(), 0);
        assert_eq!(cluster.delete_calls(), deletes_after_first);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_failed_secret_delete() {
        let cluster = populated_cluster();
        cluster.fail_delete(ResourceKind::Secret, "runner-old-secret", 1);
        let config = run_config(&ResourceKind::ALL, 3);

        let report = Sweeper::new(&config, &cluster).run().await.unwrap();

        assert_eq!(report.attempts, 2);
        for kind in ResourceKind::ALL {
            assert!(cluster
                .names(kind)
                .iter()
                .all(|name| !name.starts_with("runner-old")));
        }

        // The failed attempt never reached config maps
        let calls = cluster.calls();
        let retry_start = calls
            .iter()
            .rposition(|c| *c == Call::List(ResourceKind::Pod, "ci".to_string()))
            .unwrap();
        assert!(!calls[..retry_start]
            .iter()
            .any(|c| matches!(c, Call::List(ResourceKind::ConfigMap, _))));
    }

    #[tokio::test]
    async fn test_every_attempt_failing_exhausts_retries() {
        let cluster = populated_cluster();
        cluster.fail_list(ResourceKind::Secret, u32::MAX);
        let config = run_config(&ResourceKind::ALL, 4);

        let err = Sweeper::new(&config, &cluster).run().await.unwrap_err();

        match err {
            CleanupError::SweepExhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 4);
                let last_error = last_error.unwrap();
                assert_eq!(last_error.kind(), ResourceKind::Secret);
                assert!(matches!(last_error, ClusterError::List { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }

        let secret_lists = cluster
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::List(ResourceKind::Secret, _)))
            .count();
        assert_eq!(secret_lists, 4);
    }

    #[tokio::test]
    async fn test_zero_retries_fails_without_calls() {
        let cluster = populated_cluster();
        let config = run_config(&ResourceKind::ALL, 0);

        let err = Sweeper::new(&config, &cluster).run().await.unwrap_err();

        assert!(matches!(
            err,
            CleanupError::SweepExhausted {
                attempts: 0,
                last_error: None
            }
        ));
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_kinds_are_never_touched() {
        let cluster = populated_cluster();
        let config = run_config(&[ResourceKind::Pod], 3);

        let report = Sweeper::new(&config, &cluster).run().await.unwrap();

        assert_eq!(report.sweep.kinds.len(), 1);
        assert!(cluster.calls().iter().all(|c| match c {
            Call::List(kind, _) | Call::Delete(kind, _, _) => *kind == ResourceKind::Pod,
        }));
        assert_eq!(cluster.names(ResourceKind::Secret).len(), 4);
    }

    #[tokio::test]
    async fn test_not_found_on_delete_is_success() {
        let cluster = FakeCluster::new();
        cluster.insert_ghost(ResourceKind::ConfigMap, hours_old("runner-gone", 3));
        cluster.insert(ResourceKind::ConfigMap, hours_old("runner-stale", 3));
        let config = run_config(&[ResourceKind::ConfigMap], 1);

        let report = Sweeper::new(&config, &cluster).run().await.unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(
            report.sweep.kinds,
            vec![KindReport {
                kind: ResourceKind::ConfigMap,
                listed: 2,
                deleted: 1,
                already_gone: 1,
            }]
        );
    }

    #[tokio::test]
    async fn test_deletes_target_configured_namespace() {
        let cluster = populated_cluster();
        let config = run_config(&[ResourceKind::Pod], 1);

        Sweeper::new(&config, &cluster).run().await.unwrap();

        assert!(cluster.calls().iter().all(|c| match c {
            Call::List(_, namespace) | Call::Delete(_, _, namespace) => namespace == "ci",
        }));
    }
}
