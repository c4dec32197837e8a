/// Run configuration for the runner cleanup
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::k8s::ResourceKind;

pub const DEFAULT_HOUR_THRESHOLD: f64 = 1.5;
pub const DEFAULT_NUM_RETRIES: u32 = 10;
pub const DEFAULT_RESOURCE_PREFIX: &str = "runner-";

pub const ENV_NAMESPACE: &str = "GRC_NAMESPACE";
pub const ENV_HOUR_THRESHOLD: &str = "GRC_HOUR_THRESHOLD";
pub const ENV_NUM_RETRIES: &str = "GRC_NUM_RETRIES";
pub const ENV_CONTEXT: &str = "GRC_CONTEXT";
pub const ENV_KUBECONFIG: &str = "GRC_KUBECONFIG";
pub const ENV_RESOURCE_PREFIX: &str = "GRC_RESOURCE_PREFIX";
pub const ENV_RESOURCES: &str = "GRC_RESOURCES";

/// Unparsed option values as they arrive from flags or the environment
#[derive(Debug, Clone, Default)]
pub struct RawSettings {
    pub namespace: Option<String>,
    pub hour_threshold: Option<String>,
    pub num_retries: Option<String>,
    pub context: Option<String>,
    pub kubeconfig: Option<String>,
    pub resource_prefix: Option<String>,
    pub resources: Option<String>,
}

/// Validated settings, before the target namespace is known
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Explicit namespace; wins over anything the credentials imply
    pub namespace: Option<String>,
    pub age_threshold_hours: f64,
    pub max_retries: u32,
    pub auth_context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub name_prefix: String,
    pub enabled_kinds: BTreeSet<ResourceKind>,
}

/// Everything a sweep needs, fixed for the whole run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub namespace: String,
    pub age_threshold_hours: f64,
    pub max_retries: u32,
    pub auth_context: Option<String>,
    pub name_prefix: String,
    pub enabled_kinds: BTreeSet<ResourceKind>,
}

impl Settings {
    /// Parse and validate raw values, applying defaults for unset ones
    ///
    /// Empty or whitespace-only values count as unset.
    pub fn resolve(raw: RawSettings) -> Result<Self, ConfigError> {
        let age_threshold_hours = match present(raw.hour_threshold) {
            Some(value) => parse_threshold(&value)?,
            None => DEFAULT_HOUR_THRESHOLD,
        };

        let max_retries = match present(raw.num_retries) {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: ENV_NUM_RETRIES,
                    value,
                })?,
            None => DEFAULT_NUM_RETRIES,
        };

        let enabled_kinds = match present(raw.resources) {
            Some(value) => parse_kinds(&value)?,
            None => ResourceKind::ALL.into_iter().collect(),
        };

        Ok(Self {
            namespace: present(raw.namespace).map(|ns| ns.trim().to_string()),
            age_threshold_hours,
            max_retries,
            auth_context: present(raw.context),
            kubeconfig: present(raw.kubeconfig).map(PathBuf::from),
            name_prefix: present(raw.resource_prefix)
                .unwrap_or_else(|| DEFAULT_RESOURCE_PREFIX.to_string()),
            enabled_kinds,
        })
    }

    /// Fix the target namespace; an explicit one wins over `fallback_namespace`
    pub fn into_run_config(self, fallback_namespace: &str) -> RunConfig {
        RunConfig {
            namespace: self
                .namespace
                .unwrap_or_else(|| fallback_namespace.to_string()),
            age_threshold_hours: self.age_threshold_hours,
            max_retries: self.max_retries,
            auth_context: self.auth_context,
            name_prefix: self.name_prefix,
            enabled_kinds: self.enabled_kinds,
        }
    }
}

impl RunConfig {
    pub fn is_enabled(&self, kind: ResourceKind) -> bool {
        self.enabled_kinds.contains(&kind)
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_threshold(value: &str) -> Result<f64, ConfigError> {
    let hours = value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidNumber {
            var: ENV_HOUR_THRESHOLD,
            value: value.to_string(),
        })?;

    if !hours.is_finite() || hours <= 0.0 {
        return Err(ConfigError::NonPositiveThreshold {
            var: ENV_HOUR_THRESHOLD,
            value: hours,
        });
    }

    Ok(hours)
}

/// Parse a comma-separated kind list through the kind name table
fn parse_kinds(value: &str) -> Result<BTreeSet<ResourceKind>, ConfigError> {
    let mut kinds = BTreeSet::new();

    for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let kind = ResourceKind::from_name(token).ok_or_else(|| ConfigError::UnknownKind {
            token: token.to_string(),
        })?;
        kinds.insert(kind);
    }

    if kinds.is_empty() {
        return Err(ConfigError::NoKinds {
            value: value.to_string(),
        });
    }

    Ok(kinds)
}
