//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the store.
//!
//! # Metrics
//!
//! - `listing_mutations_total` - Successful mutations by action
//! - `listing_version_conflicts_total` - Stale updates rejected
//! - `listing_unauthorized_total` - Mutations refused for missing actor
//! - `listing_mutation_duration_seconds` - Histogram of mutation latencies
//!
//! Each store owns its own registry, so independent stores in one
//! process never collide on registration.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Successful mutations, labeled by action
    pub mutations_total: IntCounterVec,

    /// Stale updates rejected by the concurrency gate
    pub version_conflicts_total: IntCounter,

    /// Mutations refused by the actor context gate
    pub unauthorized_total: IntCounter,

    /// Mutation latency histogram
    pub mutation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let mutations_total = IntCounterVec::new(
            Opts::new("listing_mutations_total", "Successful mutations by action"),
            &["action"],
        )?;
        registry.register(Box::new(mutations_total.clone()))?;

        let version_conflicts_total = IntCounter::with_opts(Opts::new(
            "listing_version_conflicts_total",
            "Stale updates rejected by the concurrency gate",
        ))?;
        registry.register(Box::new(version_conflicts_total.clone()))?;

        let unauthorized_total = IntCounter::with_opts(Opts::new(
            "listing_unauthorized_total",
            "Mutations refused by the actor context gate",
        ))?;
        registry.register(Box::new(unauthorized_total.clone()))?;

        let mutation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "listing_mutation_duration_seconds",
                "Histogram of mutation latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(mutation_duration.clone()))?;

        Ok(Self {
            mutations_total,
            version_conflicts_total,
            unauthorized_total,
            mutation_duration,
            registry,
        })
    }

    /// Record a successful mutation
    pub fn record_mutation(&self, action: &str) {
        self.mutations_total.with_label_values(&[action]).inc();
    }

    /// Record a rejected stale update
    pub fn record_conflict(&self) {
        self.version_conflicts_total.inc();
    }

    /// Record a mutation refused for missing actor identity
    pub fn record_unauthorized(&self) {
        self.unauthorized_total.inc();
    }

    /// Record mutation duration
    pub fn record_mutation_duration(&self, duration_seconds: f64) {
        self.mutation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
