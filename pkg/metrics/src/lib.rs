use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

/// Metric names used by the discovery pipeline.
pub mod names {
    pub const DISCOVERY_TICKS: &str = "meshgate_discovery_ticks_total";
    pub const DISCOVERY_FAILURES: &str = "meshgate_discovery_failures_total";
    pub const CONFIG_UPDATES: &str = "meshgate_mesh_config_updates_total";
    pub const SERVICES_DISCOVERED: &str = "meshgate_services_discovered";
    pub const SERVICES_WITH_OPENAPI: &str = "meshgate_services_with_openapi";
    pub const LAST_TICK_DURATION_MS: &str = "meshgate_last_tick_duration_ms";
}

/// A lightweight, thread-safe metrics registry that renders in Prometheus
/// text exposition format and snapshots to plain values for the status API.
pub struct MetricsRegistry {
    metrics: RwLock<BTreeMap<String, Metric>>,
}

#[derive(Clone, Copy, PartialEq)]
enum MetricKind {
    Counter,
    Gauge,
}

struct Metric {
    kind: MetricKind,
    help: String,
    value: AtomicI64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(BTreeMap::new()),
        }
    }

    /// A registry with all discovery instruments preregistered.
    pub fn for_discovery() -> Self {
        let registry = Self::new();
        registry.register_counter(names::DISCOVERY_TICKS, "Completed discovery ticks");
        registry.register_counter(names::DISCOVERY_FAILURES, "Failed discovery ticks");
        registry.register_counter(
            names::CONFIG_UPDATES,
            "Mesh configuration writes caused by a changed service set",
        );
        registry.register_gauge(
            names::SERVICES_DISCOVERED,
            "Services seen by the most recent tick",
        );
        registry.register_gauge(
            names::SERVICES_WITH_OPENAPI,
            "Services exposing a valid OpenAPI/Swagger spec",
        );
        registry.register_gauge(
            names::LAST_TICK_DURATION_MS,
            "Duration of the most recent tick in milliseconds",
        );
        registry
    }

    /// Register a counter. If it already exists, this is a no-op.
    pub fn register_counter(&self, name: &str, help: &str) {
        self.register(name, help, MetricKind::Counter);
    }

    /// Register a gauge. If it already exists, this is a no-op.
    pub fn register_gauge(&self, name: &str, help: &str) {
        self.register(name, help, MetricKind::Gauge);
    }

    fn register(&self, name: &str, help: &str, kind: MetricKind) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.entry(name.to_string()).or_insert_with(|| Metric {
            kind,
            help: help.to_string(),
            value: AtomicI64::new(0),
        });
    }

    /// Increment a counter by 1. Unknown names are ignored.
    pub fn inc(&self, name: &str) {
        self.add(name, 1);
    }

    /// Increment a counter by a given amount.
    pub fn add(&self, name: &str, val: i64) {
        let metrics = self.metrics.read().unwrap();
        if let Some(m) = metrics.get(name) {
            if m.kind == MetricKind::Counter {
                m.value.fetch_add(val, Ordering::Relaxed);
            }
        }
    }

    /// Set a gauge to a specific value.
    pub fn set(&self, name: &str, val: i64) {
        let metrics = self.metrics.read().unwrap();
        if let Some(m) = metrics.get(name) {
            if m.kind == MetricKind::Gauge {
                m.value.store(val, Ordering::Relaxed);
            }
        }
    }

    /// Current value of a metric, if registered.
    pub fn get(&self, name: &str) -> Option<i64> {
        let metrics = self.metrics.read().unwrap();
        metrics.get(name).map(|m| m.value.load(Ordering::Relaxed))
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut output = String::new();
        let metrics = self.metrics.read().unwrap();
        for (name, metric) in metrics.iter() {
            let kind = match metric.kind {
                MetricKind::Counter => "counter",
                MetricKind::Gauge => "gauge",
            };
            output.push_str(&format!("# HELP {} {}\n", name, metric.help));
            output.push_str(&format!("# TYPE {} {}\n", name, kind));
            output.push_str(&format!(
                "{} {}\n",
                name,
                metric.value.load(Ordering::Relaxed)
            ));
        }
        output
    }

    /// Plain name→value snapshot for the JSON status endpoint.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        let metrics = self.metrics.read().unwrap();
        metrics
            .iter()
            .map(|(name, m)| (name.clone(), m.value.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
