/// Runner resource kinds and the age/prefix selection rule
use chrono::{DateTime, Utc};
use kube::{Resource, ResourceExt};
use std::fmt;

/// Kinds of namespaced resources the cleanup knows how to sweep
///
/// Variant order is the processing order of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Pod,
    Secret,
    ConfigMap,
}

impl ResourceKind {
    /// Every supported kind, in sweep order
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Pod,
        ResourceKind::Secret,
        ResourceKind::ConfigMap,
    ];

    /// Canonical singular lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Secret => "secret",
            ResourceKind::ConfigMap => "configmap",
        }
    }

    /// Look up a kind by any accepted spelling, ignoring case
    pub fn from_name(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "pod" | "pods" | "po" => Some(ResourceKind::Pod),
            "secret" | "secrets" => Some(ResourceKind::Secret),
            "configmap" | "configmaps" | "config-map" | "config-maps" | "cm" => {
                Some(ResourceKind::ConfigMap)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two facts about a listed object that decide its fate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSummary {
    pub name: String,
    pub creation_timestamp: DateTime<Utc>,
}

impl ResourceSummary {
    pub fn new(name: impl Into<String>, creation_timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            creation_timestamp,
        }
    }

    /// Build a summary from an API object
    ///
    /// Returns None when the object has no name or no creation timestamp.
    pub fn from_object<K: Resource>(object: &K) -> Option<Self> {
        let name = object.meta().name.clone()?;
        let created = object.creation_timestamp()?;
        Some(Self::new(name, created.0))
    }

    /// Age in fractional hours at `now`; negative when created in the future
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.creation_timestamp).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Pick the items that are due for deletion
///
/// An item qualifies when its name starts with `prefix` and it is strictly
/// older than `cutoff_hours` at `now`. Input order is preserved.
pub fn select<'a>(
    items: &'a [ResourceSummary],
    prefix: &str,
    cutoff_hours: f64,
    now: DateTime<Utc>,
) -> Vec<&'a ResourceSummary> {
    items
        .iter()
        .filter(|item| item.name.starts_with(prefix) && item.age_hours(now) > cutoff_hours)
        .collect()
}
