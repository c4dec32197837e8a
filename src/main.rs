/// Runner Cleanup - sweep stale CI runner resources
///
/// Deletes pods, secrets and config maps left behind by ephemeral CI runner
/// jobs once they are older than a threshold. One sweep per invocation,
/// meant to be run by an external scheduler.
mod cleanup;
mod config;
mod error;
mod k8s;
mod utils;

use clap::Parser;
use std::collections::BTreeSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cleanup::{CleanupReport, Sweeper};
use crate::config::{
    RawSettings, Settings, ENV_CONTEXT, ENV_HOUR_THRESHOLD, ENV_KUBECONFIG, ENV_NAMESPACE,
    ENV_NUM_RETRIES, ENV_RESOURCES, ENV_RESOURCE_PREFIX,
};
use crate::error::CleanupError;
use crate::k8s::{AuthResolver, ResourceKind};

#[derive(Parser)]
#[command(name = "runner-cleanup")]
#[command(about = "Delete stale CI runner pods, secrets and config maps", long_about = None)]
struct Cli {
    /// Namespace to clean (defaults to the namespace of the credentials in use)
    #[arg(long, env = ENV_NAMESPACE)]
    namespace: Option<String>,

    /// Minimum age in hours before a resource is deleted [default: 1.5]
    #[arg(long, env = ENV_HOUR_THRESHOLD)]
    hour_threshold: Option<String>,

    /// Number of sweep attempts before giving up [default: 10]
    #[arg(long, env = ENV_NUM_RETRIES)]
    retries: Option<String>,

    /// Kubeconfig context to use when not running in a cluster
    #[arg(long, env = ENV_CONTEXT)]
    context: Option<String>,

    /// Kubeconfig file to use when not running in a cluster
    #[arg(long, env = ENV_KUBECONFIG)]
    kubeconfig: Option<String>,

    /// Name prefix a resource must have to be deleted [default: runner-]
    #[arg(long, env = ENV_RESOURCE_PREFIX)]
    prefix: Option<String>,

    /// Comma-separated resource kinds to clean [default: pod,secret,configmap]
    #[arg(long, env = ENV_RESOURCES)]
    resources: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn raw_settings(&self) -> RawSettings {
        RawSettings {
            namespace: self.namespace.clone(),
            hour_threshold: self.hour_threshold.clone(),
            num_retries: self.retries.clone(),
            context: self.context.clone(),
            kubeconfig: self.kubeconfig.clone(),
            resource_prefix: self.prefix.clone(),
            resources: self.resources.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("runner_cleanup={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(&cli).await {
        Ok(report) => {
            info!(
                attempts = report.attempts,
                deleted = report.sweep.deleted(),
                already_gone = report.sweep.already_gone(),
                "✓ Cleanup completed"
            );
            for kind in &report.sweep.kinds {
                info!(
                    "  {}s: {} listed, {} deleted, {} already gone",
                    kind.kind, kind.listed, kind.deleted, kind.already_gone
                );
            }
        }
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Resolve configuration and credentials, then sweep
async fn run(cli: &Cli) -> Result<CleanupReport, CleanupError> {
    let settings = Settings::resolve(cli.raw_settings())?;

    let session = AuthResolver::from_settings(&settings).resolve().await?;
    let config = settings.into_run_config(&session.default_namespace);

    info!(
        namespace = %config.namespace,
        prefix = %config.name_prefix,
        hour_threshold = config.age_threshold_hours,
        retries = config.max_retries,
        context = config.auth_context.as_deref().unwrap_or("<current>"),
        kinds = %describe_kinds(&config.enabled_kinds),
        "Starting runner resource cleanup"
    );

    Sweeper::new(&config, session.client.as_ref()).run().await
}

fn describe_kinds(kinds: &BTreeSet<ResourceKind>) -> String {
    kinds
        .iter()
        .map(ResourceKind::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
