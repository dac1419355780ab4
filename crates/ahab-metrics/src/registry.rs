//! Counter registration for fixers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ::prometheus::{IntCounter, Opts, Registry};
use thiserror::Error;
use tracing::debug;

use ahab_fixer::FixerStats;

/// Errors raised while registering counters.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid counter {name}: {source}")]
    Counter {
        name: String,
        #[source]
        source: ::prometheus::Error,
    },

    #[error("counter registry lock poisoned")]
    Poisoned,
}

/// Exporting counters sink for one fixer.
#[derive(Debug, Clone)]
pub struct PrometheusStats {
    needs_fixing: IntCounter,
    fixed: IntCounter,
    fix_failed: IntCounter,
}

impl PrometheusStats {
    pub fn needs_fixing(&self) -> u64 {
        self.needs_fixing.get()
    }

    pub fn fixed(&self) -> u64 {
        self.fixed.get()
    }

    pub fn fix_failed(&self) -> u64 {
        self.fix_failed.get()
    }
}

impl FixerStats for PrometheusStats {
    fn inc_needs_fixing(&self) {
        self.needs_fixing.inc();
    }

    fn inc_fixed(&self) {
        self.fixed.inc();
    }

    fn inc_fix_failed(&self) {
        self.fix_failed.inc();
    }
}

/// Owns the registry that fixer counters are exported from.
///
/// Cheap to clone; clones share the registry and the registration table.
#[derive(Clone, Default)]
pub struct FixerMetrics {
    registry: Registry,
    registered: Arc<Mutex<HashMap<(String, String), Arc<PrometheusStats>>>>,
}

impl FixerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing registry, e.g. one shared with other exporters.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            registered: Arc::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered counter.
    pub fn render(&self) -> String {
        crate::prometheus::render_prometheus(self)
    }

    /// Register the counters for fixer `name` under subsystem `source`.
    ///
    /// Registering the same `(source, name)` again returns the handle
    /// created the first time.
    pub fn register(&self, source: &str, name: &str) -> Result<Arc<PrometheusStats>, MetricsError> {
        let mut registered = self.registered.lock().map_err(|_| MetricsError::Poisoned)?;
        let key = (source.to_string(), name.to_string());
        if let Some(existing) = registered.get(&key) {
            debug!(%source, %name, "fixer counters already registered");
            return Ok(Arc::clone(existing));
        }

        let stats = Arc::new(PrometheusStats {
            needs_fixing: self.counter(
                source,
                format!("{name}_restarts"),
                format!("# of {name} restarts due to an unhealthy state."),
            )?,
            fixed: self.counter(
                source,
                format!("{name}_fixed"),
                format!("# of times {name} was fixed due to an unhealthy state."),
            )?,
            fix_failed: self.counter(
                source,
                format!("{name}_fix_failed"),
                format!("# of times fixing {name} failed."),
            )?,
        });

        registered.insert(key, Arc::clone(&stats));
        debug!(%source, %name, "fixer counters registered");
        Ok(stats)
    }

    fn counter(&self, source: &str, name: String, help: String) -> Result<IntCounter, MetricsError> {
        let wrap = |source| MetricsError::Counter {
            name: name.clone(),
            source,
        };
        let counter = IntCounter::with_opts(Opts::new(name.clone(), help).subsystem(source))
            .map_err(wrap)?;
        self.registry
            .register(Box::new(counter.clone()))
            .map_err(wrap)?;
        Ok(counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_creates_three_counters() {
        let metrics = FixerMetrics::new();
        metrics.register("ahabd", "docker").unwrap();

        let mut names: Vec<String> = metrics
            .registry()
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "ahabd_docker_fix_failed",
                "ahabd_docker_fixed",
                "ahabd_docker_restarts",
            ]
        );
    }

    #[test]
    fn register_is_idempotent() {
        let metrics = FixerMetrics::new();
        let first = metrics.register("ahabd", "docker").unwrap();
        let second = metrics.register("ahabd", "docker").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        first.inc_needs_fixing();
        assert_eq!(second.needs_fixing(), 1);
        assert_eq!(metrics.registry().gather().len(), 3);
    }

    #[test]
    fn clones_share_registrations() {
        let metrics = FixerMetrics::new();
        let clone = metrics.clone();
        let a = metrics.register("ahabd", "kube_proxy").unwrap();
        let b = clone.register("ahabd", "kube_proxy").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn separate_fixers_get_separate_counters() {
        let metrics = FixerMetrics::new();
        let docker = metrics.register("ahabd", "docker").unwrap();
        let proxy = metrics.register("ahabd", "kube_proxy").unwrap();

        docker.inc_needs_fixing();
        docker.inc_fix_failed();
        proxy.inc_fixed();

        assert_eq!(docker.needs_fixing(), 1);
        assert_eq!(docker.fix_failed(), 1);
        assert_eq!(docker.fixed(), 0);
        assert_eq!(proxy.fixed(), 1);
        assert_eq!(metrics.registry().gather().len(), 6);
    }

    #[test]
    fn invalid_name_is_an_error() {
        let metrics = FixerMetrics::new();
        let err = metrics.register("ahabd", "kube-proxy").unwrap_err();
        assert!(matches!(err, MetricsError::Counter { .. }), "{err}");
    }
}
