/// Kubernetes cluster access for runner resources
pub mod auth;
pub mod client;
pub mod resources;
#[cfg(test)]
pub mod testing;

pub use auth::AuthResolver;
pub use client::{ClusterClient, DeleteOutcome};
pub use resources::ResourceKind;
