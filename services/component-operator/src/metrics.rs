use std::time::Duration;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

use crate::error::ErrorClass;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ReconcileOutcome {
    Done,
    RequeueAfter,
    RequeueNow,
    Deleted,
    Error,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: ReconcileOutcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum FailureClass {
    Transient,
    Domain,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FailureLabels {
    pub class: FailureClass,
}

pub struct Metrics {
    registry: Registry,
    reconciliations: Family<OutcomeLabels, Counter>,
    failures: Family<FailureLabels, Counter>,
    builds_triggered: Counter,
    reconcile_duration: Histogram,
}

impl Default for Metrics {
    fn default() -> Self {
        let mut registry = Registry::with_prefix("poddle_operator");

        let reconciliations = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "reconciliations",
            "Reconcile ticks grouped by outcome",
            reconciliations.clone(),
        );

        let failures = Family::<FailureLabels, Counter>::default();
        registry.register(
            "failures",
            "Failed reconcile ticks grouped by error class",
            failures.clone(),
        );

        let builds_triggered = Counter::default();
        registry.register(
            "builds_triggered",
            "Build runs instantiated by the operator",
            builds_triggered.clone(),
        );

        let reconcile_duration = Histogram::new(exponential_buckets(0.005, 2.0, 14));
        registry.register(
            "reconcile_duration_seconds",
            "Wall-clock time of one reconcile tick",
            reconcile_duration.clone(),
        );

        Self {
            registry,
            reconciliations,
            failures,
            builds_triggered,
            reconcile_duration,
        }
    }
}

impl Metrics {
    pub fn record_reconcile(&self, outcome: ReconcileOutcome, elapsed: Duration) {
        self.reconciliations
            .get_or_create(&OutcomeLabels { outcome })
            .inc();
        self.reconcile_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_failure(&self, class: ErrorClass) {
        let class = match class {
            ErrorClass::Domain => FailureClass::Domain,
            ErrorClass::Transient => FailureClass::Transient,
            ErrorClass::Deleted => return,
        };
        self.failures.get_or_create(&FailureLabels { class }).inc();
    }

    pub fn record_build_triggered(&self) {
        self.builds_triggered.inc();
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}
