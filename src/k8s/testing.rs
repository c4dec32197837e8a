/// In-memory cluster used by unit tests
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::client::{ClusterClient, DeleteOutcome};
use super::resources::{ResourceKind, ResourceSummary};

/// A call the fake cluster received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(ResourceKind, String),
    Delete(ResourceKind, String, String),
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ResourceKind, Vec<ResourceSummary>>,
    /// Listed, but already gone by the time they are deleted
    ghosts: BTreeMap<ResourceKind, Vec<ResourceSummary>>,
    list_failures: HashMap<ResourceKind, u32>,
    delete_failures: HashMap<(ResourceKind, String), u32>,
    calls: Vec<Call>,
}

/// `ClusterClient` over a single in-memory namespace
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: ResourceKind, summary: ResourceSummary) {
        let mut state = self.state.lock().unwrap();
        state.objects.entry(kind).or_default().push(summary);
    }

    pub fn insert_ghost(&self, kind: ResourceKind, summary: ResourceSummary) {
        let mut state = self.state.lock().unwrap();
        state.ghosts.entry(kind).or_default().push(summary);
    }

    /// Make the next `times` listings of `kind` fail
    pub fn fail_list(&self, kind: ResourceKind, times: u32) {
        self.state.lock().unwrap().list_failures.insert(kind, times);
    }

    /// Make the next `times` deletions of `name` fail
    pub fn fail_delete(&self, kind: ResourceKind, name: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .delete_failures
            .insert((kind, name.to_string()), times);
    }

    pub fn names(&self, kind: ResourceKind) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&kind)
            .map(|items| items.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Delete(..)))
            .count()
    }
}

fn take_failure<K: std::hash::Hash + Eq>(failures: &mut HashMap<K, u32>, key: &K) -> bool {
    match failures.get_mut(key) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<ResourceSummary>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List(kind, namespace.to_string()));

        if take_failure(&mut state.list_failures, &kind) {
            anyhow::bail!("simulated list failure for {}s", kind);
        }

        let mut items = state.objects.get(&kind).cloned().unwrap_or_default();
        items.extend(state.ghosts.get(&kind).cloned().unwrap_or_default());
        Ok(items)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<DeleteOutcome> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Delete(kind, name.to_string(), namespace.to_string()));

        if take_failure(&mut state.delete_failures, &(kind, name.to_string())) {
            anyhow::bail!("simulated delete failure for {} {}", kind, name);
        }

        if let Some(ghosts) = state.ghosts.get_mut(&kind) {
            ghosts.retain(|g| g.name != name);
        }

        let items = state.objects.entry(kind).or_default();
        let before = items.len();
        items.retain(|i| i.name != name);

        if items.len() < before {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }
}
