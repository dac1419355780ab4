//! ahab-kube — network-proxy health observation.
//!
//! Finds the kube-proxy pod scheduled on this node, reads its `/healthz`
//! endpoint and reports it as needing a fix when its rules have not been
//! synced recently. Repair is deliberately a no-op: this fixer observes
//! and counts, it does not touch kube-proxy.
//!
//! # Architecture
//!
//! ```text
//! KubeProxyFixer
//!   ├── PodLookup::find_local_pod("kube-proxy")   (InClusterPods → API server)
//!   ├── probe_healthz(podIP:10256)                 → ProbeResult
//!   └── fix() → observe-only, always Ok
//! ```
//!
//! # Probe policy
//!
//! Fail-open on lookup: if the pod cannot be found the proxy is assumed
//! healthy. Once the pod is known, an unreachable or stale endpoint
//! counts as needing a fix.

pub mod error;
pub mod fixer;
pub mod healthz;
pub mod pods;

#[cfg(test)]
mod testing;

pub use error::KubeError;
pub use fixer::KubeProxyFixer;
pub use healthz::{probe_healthz, ProbeResult, ProxyHealthz};
pub use pods::{InClusterPods, PodInfo, PodLookup};
