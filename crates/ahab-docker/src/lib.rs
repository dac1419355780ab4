//! ahab-docker — container-runtime health fixer.
//!
//! Decides whether the local Docker daemon is healthy by running a real
//! workload through it, and repairs it by escalating from a service
//! restart to a reboot request.
//!
//! # Architecture
//!
//! ```text
//! DockerFixer
//!   ├── needs_fixing: HelloWorldRunner (1 minute timeout)
//!   │     pull → create → start → wait → logs == "hello world" → remove
//!   └── fix: EscalationChain
//!         ├── SystemdRestart("docker.service")
//!         └── RebootSentinel("/var/run/reboot-required")
//! ```
//!
//! # Probe policy
//!
//! Fail-safe: a probe error or timeout counts as unhealthy. A probe cut
//! short by daemon shutdown counts as healthy, since shutdown says
//! nothing about the runtime. Either way a stopped probe still
//! force-removes the container it created.

pub mod client;
pub mod error;
pub mod fixer;
pub mod remedy;
pub mod runner;

#[cfg(test)]
mod testing;

pub use client::{ContainerConfig, DockerClient};
pub use error::DockerError;
pub use fixer::DockerFixer;
pub use remedy::{RebootSentinel, SystemdRestart};
pub use runner::{ContainerRunner, HelloWorldRunner};
