//! Prometheus metrics for the Authentimed node.
//!
//! The [`NodeMetrics`] struct owns a dedicated [`Registry`] that callers can
//! encode into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use authentimed_types::Verdict;

pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Products admitted to the ledger.
    pub registrations: IntCounter,
    /// Registration attempts refused, labelled by error kind.
    pub registrations_rejected: IntCounterVec,
    /// Evaluated scans, labelled by verdict.
    pub scans: IntCounterVec,
    /// Scans that gave up waiting for a product lock.
    pub ledger_busy: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Registered products.
    pub product_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time to evaluate and commit one scan, in milliseconds.
    pub scan_latency_ms: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let registrations = register_int_counter_with_registry!(
            Opts::new(
                "authentimed_registrations_total",
                "Products admitted to the ledger"
            ),
            registry
        )?;

        let registrations_rejected = register_int_counter_vec_with_registry!(
            Opts::new(
                "authentimed_registrations_rejected_total",
                "Registration attempts refused"
            ),
            &["kind"],
            registry
        )?;

        let scans = register_int_counter_vec_with_registry!(
            Opts::new("authentimed_scans_total", "Evaluated scans by verdict"),
            &["verdict"],
            registry
        )?;

        let ledger_busy = register_int_counter_with_registry!(
            Opts::new(
                "authentimed_ledger_busy_total",
                "Scans that timed out waiting for a product lock"
            ),
            registry
        )?;

        let product_count = register_int_gauge_with_registry!(
            Opts::new("authentimed_product_count", "Registered products"),
            registry
        )?;

        // Exponential buckets covering 0.1 ms to ~1.6 s.
        let scan_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "authentimed_scan_latency_ms",
                "Scan evaluation and commit time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.1, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            registrations,
            registrations_rejected,
            scans,
            ledger_busy,
            product_count,
            scan_latency_ms,
        })
    }

    pub fn observe_verdict(&self, verdict: Verdict) {
        self.scans.with_label_values(&[verdict.as_str()]).inc();
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_are_counted_by_label() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.observe_verdict(Verdict::Genuine);
        metrics.observe_verdict(Verdict::Replayed);
        metrics.observe_verdict(Verdict::Replayed);

        assert_eq!(metrics.scans.with_label_values(&["GENUINE"]).get(), 1);
        assert_eq!(metrics.scans.with_label_values(&["REPLAYED"]).get(), 2);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("authentimed_scans_total"));
    }
}
