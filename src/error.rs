/// Error taxonomy for a cleanup run
///
/// Only `CleanupError` escapes the orchestrator. `ClusterError` is the
/// transient category and is converted into a retry by the sweep loop.
use thiserror::Error;

use crate::k8s::ResourceKind;

/// Malformed or inconsistent run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be a finite number greater than zero, got {value}")]
    NonPositiveThreshold { var: &'static str, value: f64 },

    #[error("unknown resource kind {token:?} (expected pod, secret or configmap)")]
    UnknownKind { token: String },

    #[error("no resource kinds enabled in {value:?}")]
    NoKinds { value: String },
}

/// Why a single credential strategy could not produce a client
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: String,
    pub reason: String,
}

/// No credential source produced a usable client
#[derive(Debug, Error)]
#[error("no usable cluster credentials ({})", describe_failures(.failures))]
pub struct AuthError {
    pub failures: Vec<StrategyFailure>,
}

fn describe_failures(failures: &[StrategyFailure]) -> String {
    if failures.is_empty() {
        return "no credential strategies configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.strategy, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A listing or deletion call against the cluster failed
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to list {kind}s in namespace {namespace}: {cause:#}")]
    List {
        kind: ResourceKind,
        namespace: String,
        cause: anyhow::Error,
    },

    #[error("failed to delete {kind} {name} in namespace {namespace}: {cause:#}")]
    Delete {
        kind: ResourceKind,
        name: String,
        namespace: String,
        cause: anyhow::Error,
    },
}

impl ClusterError {
    /// Resource kind the failing call was made for
    pub fn kind(&self) -> ResourceKind {
        match self {
            ClusterError::List { kind, .. } | ClusterError::Delete { kind, .. } => *kind,
        }
    }
}

/// Terminal failure of a cleanup run
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(
        "not all runner resources could be confirmed deleted after {attempts} attempt(s){}",
        describe_last(.last_error)
    )]
    SweepExhausted {
        attempts: u32,
        last_error: Option<ClusterError>,
    },
}

fn describe_last(last_error: &Option<ClusterError>) -> String {
    match last_error {
        Some(err) => format!("; last failure on {}s: {}", err.kind(), err),
        None => String::new(),
    }
}
